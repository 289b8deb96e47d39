use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("A generation is already running; stop it or wait for it to finish")]
    Busy,

    #[error("Generation worker is not running: {0}")]
    WorkerGone(String),
}

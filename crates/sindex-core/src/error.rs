pub type CoreResult<T> = Result<T, CoreError>;

macro_rules! bail {
    ($($arg:tt)*) => {{
        return Err($crate::error::CoreError::Other(format!($($arg)*)));
    }};
}

pub(crate) use bail;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CoreError {
    #[error("invalid normalization factor {name} = {value} (topic = {topic}, year = {year})")]
    InvalidFactor {
        name: &'static str,
        value: f64,
        topic: String,
        year: i32,
    },

    #[error("invalid date '{0}'")]
    Date(String),

    #[error("{0}")]
    Other(String),
}

impl CoreError {
    #[inline]
    pub fn other<T: ToString>(s: T) -> Self {
        Self::Other(s.to_string())
    }
}

use std::fmt;

#[derive(Debug)]
pub enum FolioError {
    NoPageOpen,
    InvalidCall,
    DocumentClosed,
    InvalidRotation(i32),
    UndefinedFont(String),
    NoFontSelected,
    FontStyleUnavailable(String),
    UnsupportedImage(String),
    ImageDecode(String),
    UnknownLink(usize),
    Io(std::io::Error),
}

impl fmt::Display for FolioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolioError::NoPageOpen => write!(f, "no page has been added yet"),
            FolioError::InvalidCall => write!(f, "invalid call"),
            FolioError::DocumentClosed => write!(f, "the document is closed"),
            FolioError::InvalidRotation(angle) => {
                write!(f, "rotation must be a multiple of 90: {}", angle)
            }
            FolioError::UndefinedFont(key) => write!(f, "undefined font: {}", key),
            FolioError::NoFontSelected => write!(f, "no font has been set"),
            FolioError::FontStyleUnavailable(key) => {
                write!(f, "font style not available: {}", key)
            }
            FolioError::UnsupportedImage(message) => {
                write!(f, "unsupported image: {}", message)
            }
            FolioError::ImageDecode(message) => write!(f, "image decode error: {}", message),
            FolioError::UnknownLink(handle) => write!(f, "unknown link handle: {}", handle),
            FolioError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for FolioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FolioError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FolioError {
    fn from(value: std::io::Error) -> Self {
        FolioError::Io(value)
    }
}

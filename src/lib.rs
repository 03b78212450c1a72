//! A PDF generator in the classic single-pass mould: pages are laid out
//! top to bottom with cells, wrapped text and images, and the finished
//! document is serialized object by object with a hand-built cross
//! reference table.
//!
//! ```no_run
//! use folio::{Align, Border, CellAdvance, Document, DocumentOptions, FontStyle};
//!
//! # fn main() -> Result<(), folio::FolioError> {
//! let mut doc = Document::new(DocumentOptions::default());
//! doc.add_page()?;
//! doc.set_font("helvetica", FontStyle::BOLD, 16.0)?;
//! doc.cell(
//!     40.0,
//!     10.0,
//!     "Hello World!",
//!     Border::None,
//!     CellAdvance::Right,
//!     Align::Left,
//!     false,
//!     None,
//! )?;
//! doc.output_to_file("hello.pdf")?;
//! # Ok(())
//! # }
//! ```

mod core_fonts;
mod document;
mod error;
mod font;
mod image;
mod page;
mod pdf;
mod types;

pub use document::Document;
pub use error::FolioError;
pub use font::{FontDef, FontDescriptor, FontKind, FontProgram, UnicodeMapping};
pub use image::ImageFormat;
pub use page::LinkTarget;
pub use types::{
    Align, Border, CellAdvance, Color, DocumentOptions, FontStyle, Metadata, Orientation,
    PageFormat, PageLayout, RectStyle, Size, Unit, ZoomMode,
};

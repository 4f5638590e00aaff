pub mod kismet;

pub use kismet::{IngestError, IngestReport, KismetIngestor, KismetLineError, KismetTail};

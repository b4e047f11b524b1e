use crate::time_window::ShopTimezone;
use std::path::PathBuf;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn port(&self) -> u16;
    fn database_url(&self) -> Option<String>;
    /// Offset every wall-clock value is interpreted in.
    fn timezone(&self) -> ShopTimezone;
    fn seed_file(&self) -> Option<PathBuf>;
}

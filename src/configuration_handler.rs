use crate::configuration::Configuration;
use crate::time_window::{parse_timezone, ShopTimezone};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "barber_booking", about = "Barber shop booking and availability service")]
pub struct ConfigurationHandler {
    #[arg(long, env = "BOOKING_PORT", default_value_t = 8000)]
    pub port: u16,

    /// PostgreSQL connection. Without it records are kept in memory.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Fixed UTC offset of the shops, e.g. "+05:30".
    #[arg(long, env = "SHOP_UTC_OFFSET", default_value = "+05:30", value_parser = parse_timezone)]
    pub utc_offset: ShopTimezone,

    /// JSON file the in-memory store is seeded from.
    #[arg(long, env = "SEED_FILE")]
    pub seed_file: Option<PathBuf>,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn port(&self) -> u16 {
        self.port
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn timezone(&self) -> ShopTimezone {
        self.utc_offset
    }

    fn seed_file(&self) -> Option<PathBuf> {
        self.seed_file.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_explicit_arguments() {
        let configuration = ConfigurationHandler::try_parse_from([
            "barber_booking",
            "--port",
            "9000",
            "--utc-offset",
            "-03:00",
            "--seed-file",
            "demos/seed.json",
        ])
        .unwrap();

        assert_eq!(configuration.port(), 9000);
        assert_eq!(
            configuration.timezone(),
            ShopTimezone::from_minutes(-180).unwrap()
        );
        assert_eq!(
            configuration.seed_file(),
            Some(PathBuf::from("demos/seed.json"))
        );
    }

    #[test]
    fn test_rejects_malformed_offset() {
        ConfigurationHandler::try_parse_from(["barber_booking", "--utc-offset", "IST"])
            .unwrap_err();
    }
}

// Daily-bar CSV loader (Date,Open,High,Low,Close,Volume, extra columns ignored)

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use log::warn;

use crate::error::EngineError;
use crate::market::{DailyBar, QuoteHistory};

/// Load OHLCV bars from a Yahoo-style CSV and return a validated history
/// (oldest first). Rows with unparsable or missing fields are skipped.
pub fn load_history<P: AsRef<Path>>(path: P) -> Result<QuoteHistory, EngineError> {
    let file = File::open(path.as_ref())?;
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .has_headers(true)
        .from_reader(file);

    let mut bars = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.len() < 6 {
            continue;
        }

        let date = match record[0].parse::<NaiveDate>() {
            Ok(d) => d,
            Err(_) => {
                warn!("skipping row with unparsable date '{}'", &record[0]);
                continue;
            }
        };

        let fields: Option<Vec<f64>> = (1..6)
            .map(|i| {
                let raw = record[i].trim();
                if raw.is_empty() || raw == "null" || raw == "N/A" {
                    None
                } else {
                    raw.parse::<f64>().ok()
                }
            })
            .collect();

        let Some(f) = fields else {
            warn!("skipping incomplete bar on {}", date);
            continue;
        };

        bars.push(DailyBar {
            date,
            open: f[0],
            high: f[1],
            low: f[2],
            close: f[3],
            volume: f[4],
        });
    }

    if bars.is_empty() {
        return Err(EngineError::DataLoad(
            "no valid bars parsed - check CSV format".into(),
        ));
    }

    bars.sort_by_key(|b| b.date);
    QuoteHistory::new(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_and_orders_bars() {
        let dir = std::env::temp_dir().join("creditscout_csv_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bars.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
        writeln!(file, "2025-03-04,10.5,11.2,10.1,11.0,1200").unwrap();
        writeln!(file, "2025-03-03,10.0,10.8,9.9,10.4,1500").unwrap();
        writeln!(file, "2025-03-05,bad,11.0,10.0,10.9,900").unwrap();

        let history = load_history(&path).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.bars()[0].date, "2025-03-03".parse().unwrap());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn empty_file_is_a_load_error() {
        let dir = std::env::temp_dir().join("creditscout_csv_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("empty.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
        assert!(load_history(&path).is_err());
        std::fs::remove_file(path).ok();
    }
}

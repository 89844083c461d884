use crate::error::{Error, Result};
use crate::metrics::ReportOptions;
use crate::storage::{repository, Database};

/// Config keys that tune the report, with a short description each.
pub const REPORT_KEYS: &[(&str, &str)] = &[
    ("top_n", "routes listed in top delayed routes (default 10)"),
    ("least_efficient_n", "routes listed as least efficient (default 3)"),
    ("bottleneck_n", "warehouses listed as bottlenecks (default 3)"),
    ("delayed_share_threshold", "delayed share %, routes above are listed (default 20)"),
    ("sla_threshold", "on-time % below which agents underperform (default 80)"),
    ("speed_sample_n", "agents in each speed comparison group (default 5)"),
    ("severe_delay_threshold", "delay checkpoints above which an order is severe (default 2)"),
];

/// Key recorded after every successful import.
pub const LAST_IMPORT_KEY: &str = "last_import_dir";

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got '{value}'")))
}

fn parse_percent(key: &str, value: &str) -> Result<f64> {
    let v = value
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{key} must be a number, got '{value}'")))?;
    if !(0.0..=100.0).contains(&v) {
        return Err(Error::Config(format!("{key} must be between 0 and 100, got {v}")));
    }
    Ok(v)
}

/// Apply one config entry to `options`. Unknown keys are ignored.
pub fn apply(options: &mut ReportOptions, key: &str, value: &str) -> Result<()> {
    match key {
        "top_n" => options.top_n = parse_count(key, value)?,
        "least_efficient_n" => options.least_efficient_n = parse_count(key, value)?,
        "bottleneck_n" => options.bottleneck_n = parse_count(key, value)?,
        "speed_sample_n" => options.speed_sample_n = parse_count(key, value)?,
        "severe_delay_threshold" => {
            options.severe_delay_threshold = parse_count(key, value)? as u64
        }
        "delayed_share_threshold" => {
            options.delayed_share_threshold = parse_percent(key, value)?
        }
        "sla_threshold" => options.sla_threshold = parse_percent(key, value)?,
        _ => {}
    }
    Ok(())
}

/// Check a value before it is stored.
pub fn validate(key: &str, value: &str) -> Result<()> {
    let mut scratch = ReportOptions::default();
    apply(&mut scratch, key, value)
}

/// Build report options from stored config entries over the defaults.
pub fn options_from_entries(entries: &[(String, String)]) -> Result<ReportOptions> {
    let mut options = ReportOptions::default();
    for (key, value) in entries {
        apply(&mut options, key, value)?;
    }
    Ok(options)
}

/// Read report options from the database's `app_config` table.
pub async fn load_report_options(db: &Database) -> Result<ReportOptions> {
    let entries = db
        .reader()
        .call(|conn| repository::list_config(conn))
        .await?;
    options_from_entries(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_empty() {
        let options = options_from_entries(&[]).unwrap();
        assert_eq!(options, ReportOptions::default());
    }

    #[test]
    fn test_overrides_applied() {
        let options = options_from_entries(&entries(&[
            ("top_n", "5"),
            ("sla_threshold", "85.5"),
            ("severe_delay_threshold", "4"),
            ("last_import_dir", "/data"),
        ]))
        .unwrap();
        assert_eq!(options.top_n, 5);
        assert_eq!(options.sla_threshold, 85.5);
        assert_eq!(options.severe_delay_threshold, 4);
        assert_eq!(options.bottleneck_n, 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(validate("top_n", "-1"), Err(Error::Config(_))));
        assert!(matches!(validate("top_n", "ten"), Err(Error::Config(_))));
        assert!(matches!(validate("sla_threshold", "120"), Err(Error::Config(_))));
        assert!(validate("sla_threshold", "75").is_ok());
        assert!(validate("anything_else", "x").is_ok());
    }

    #[tokio::test]
    async fn test_load_report_options_from_database() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| repository::set_config(conn, "top_n", "3"))
            .await
            .unwrap();
        let options = load_report_options(&db).await.unwrap();
        assert_eq!(options.top_n, 3);
    }
}

use crate::domain::model::DailyStats;
use crate::utils::error::Result;
use chrono::NaiveDate;

/// Daily rows of one product, oldest first.
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    rows: Vec<DailyStats>,
}

impl PriceHistory {
    pub fn new(mut rows: Vec<DailyStats>) -> Self {
        rows.sort_by_key(|row| row.date);
        Self { rows }
    }

    /// Parse a `date,count,min,max,mean,median` CSV file.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        let mut rows = Vec::new();
        for record in reader.deserialize::<DailyStats>() {
            let row = record?;
            if let Err(e) = row.validate() {
                tracing::warn!("Inconsistent history row kept as-is: {}", e);
            }
            rows.push(row);
        }

        Ok(Self::new(rows))
    }

    pub fn rows(&self) -> &[DailyStats] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.rows.iter().any(|row| row.date == date)
    }

    pub fn latest(&self) -> Option<&DailyStats> {
        self.rows.last()
    }

    /// Rows on or after `start`.
    pub fn since(&self, start: NaiveDate) -> &[DailyStats] {
        let idx = self.rows.partition_point(|row| row.date < start);
        &self.rows[idx..]
    }
}

/// Serialize one row, with the header line only for a fresh file.
pub fn append_row(stats: &DailyStats, write_header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(Vec::new());
    writer.serialize(stats)?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn stats(d: u32, prices: &[i64]) -> DailyStats {
        DailyStats::from_prices(date(d), prices).unwrap()
    }

    #[test]
    fn test_append_row_header_only_once() {
        let mut file = append_row(&stats(1, &[100, 300]), true).unwrap();
        file.extend(append_row(&stats(2, &[200]), false).unwrap());

        let text = String::from_utf8(file.clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], DailyStats::CSV_HEADER);
        assert!(lines[1].starts_with("2025-01-01,2,100,300,"));
        assert!(lines[2].starts_with("2025-01-02,1,200,200,"));

        let history = PriceHistory::parse(&file).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().unwrap().median_price, 200.0);
        assert_eq!(history.rows()[0], stats(1, &[100, 300]));
    }

    #[test]
    fn test_parse_written_by_hand() {
        let csv = "date,count,min,max,mean,median\n\
                   2025-01-03,12,1500,9000,4210.5,3999.0\n\
                   2025-01-01,10,1400,8800,4100.25,3900\n";
        let history = PriceHistory::parse(csv.as_bytes()).unwrap();

        // sorted by date regardless of file order
        assert_eq!(history.rows()[0].date, date(1));
        assert_eq!(history.latest().unwrap().count, 12);
        assert_eq!(history.latest().unwrap().mean_price, 4210.5);
        assert!(history.contains(date(3)));
        assert!(!history.contains(date(2)));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let history = PriceHistory::parse(b"date,count,min,max,mean,median\n").unwrap();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }

    #[test]
    fn test_malformed_row_is_error() {
        let csv = "date,count,min,max,mean,median\nyesterday,1,2,3,4,5\n";
        assert!(PriceHistory::parse(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_since() {
        let history = PriceHistory::new(vec![
            stats(5, &[1]),
            stats(1, &[1]),
            stats(9, &[1]),
        ]);
        let recent = history.since(date(5));
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].date, date(5));
        assert!(history.since(date(10)).is_empty());
        assert_eq!(history.since(date(1)).len(), 3);
    }
}

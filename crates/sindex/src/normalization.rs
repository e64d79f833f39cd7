use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use sindex_core::normalization::UNKNOWN_YEAR;
use sindex_core::{NormalizationTable, NormalizationTableBuilder};

use crate::prelude::*;

/// Reads the normalization reference table from a CSV or Arrow IPC
/// file with the columns `topic_id`, `year`, `ft_median`,
/// `ctw_median` and `mtw_median`.
///
/// Rows with a missing topic or an invalid factor are skipped; the
/// number of skipped rows is returned along with the table. A missing
/// year denotes a year-agnostic row.
pub(crate) fn read_table(
    path: &Path,
) -> SindexResult<(NormalizationTable, usize)> {
    let df = match path.extension().and_then(|ext| ext.to_str()) {
        Some("ipc" | "arrow" | "feather") => {
            IpcReader::new(File::open(path)?).finish()?
        }
        _ => CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.into()))?
            .finish()?,
    };

    let topic = df.column("topic_id")?.cast(&DataType::String)?;
    let year = df.column("year")?.cast(&DataType::Int64)?;
    let ft = df.column("ft_median")?.cast(&DataType::Float64)?;
    let ctw = df.column("ctw_median")?.cast(&DataType::Float64)?;
    let mtw = df.column("mtw_median")?.cast(&DataType::Float64)?;

    let topic = topic.str()?;
    let year = year.i64()?;
    let ft = ft.f64()?;
    let ctw = ctw.f64()?;
    let mtw = mtw.f64()?;

    let mut builder = NormalizationTableBuilder::new();
    let mut skipped = 0;

    for idx in 0..df.height() {
        let year = match year.get(idx) {
            Some(year) => match i32::try_from(year) {
                Ok(year) => year,
                Err(_) => {
                    log::debug!("skip row {idx}: year {year} out of range");
                    skipped += 1;
                    continue;
                }
            },
            None => UNKNOWN_YEAR,
        };

        let (Some(topic), Some(ft), Some(ctw), Some(mtw)) =
            (topic.get(idx), ft.get(idx), ctw.get(idx), mtw.get(idx))
        else {
            log::debug!("skip row {idx}: missing value");
            skipped += 1;
            continue;
        };

        if let Err(e) = builder.insert(topic, year, ft, ctw, mtw) {
            log::debug!("skip row {idx}: {e}");
            skipped += 1;
        }
    }

    if skipped > 0 {
        log::warn!(
            "skipped {skipped} invalid row(s) of normalization table {}",
            path.display()
        );
    }

    log::info!(
        "loaded {} normalization row(s) from {}",
        builder.len(),
        path.display()
    );

    Ok((builder.build(), skipped))
}

/// Loads the normalization table, if a path is given. Without a path,
/// every lookup resolves to the default factors.
pub(crate) fn load_table(
    path: Option<&Path>,
) -> SindexResult<NormalizationTable> {
    match path {
        Some(path) => Ok(read_table(path)?.0),
        None => {
            log::warn!("no normalization table, using default factors");
            Ok(NormalizationTable::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use approx::assert_relative_eq;
    use sindex_core::TopicId;

    use super::*;

    type TestResult = anyhow::Result<()>;

    #[test]
    fn read_csv_table() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("norm.csv");
        fs::write(
            &path,
            "topic_id,year,ft_median,ctw_median,mtw_median\n\
             T100,2020,0.6,2.0,3.0\n\
             ALL,2020,0.5,1.0,1.0\n\
             ALL,,0.4,1.0,1.0\n\
             T200,2021,0.0,1.0,1.0\n",
        )?;

        let (table, skipped) = read_table(&path)?;
        assert_eq!(table.len(), 3);
        assert_eq!(skipped, 1);

        let topic = TopicId::parse("T100");
        let factors = table.resolve(topic.as_ref(), Some(2020));
        assert_eq!(factors.topic_id_used(), "T100");
        assert_relative_eq!(factors.ctw().get(), 2.0);

        let factors = table.resolve(None, None);
        assert_eq!(factors.year_used(), Some(UNKNOWN_YEAR));
        assert_relative_eq!(factors.ft().get(), 0.4);
        Ok(())
    }

    #[test]
    fn missing_table_uses_defaults() -> TestResult {
        let table = load_table(None)?;
        assert!(table.is_empty());
        assert!(read_table(Path::new("/nonexistent/norm.csv")).is_err());
        Ok(())
    }
}

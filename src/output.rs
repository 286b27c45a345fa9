use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::app::ReportResult;
use crate::domain::{OrganismInfo, ReportFormat};
use crate::error::JarvisError;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_info(info: &OrganismInfo) -> io::Result<()> {
        Self::print_json(info)
    }

    pub fn print_report(result: &ReportResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn report_path(dir: &Path, result: &ReportResult, format: ReportFormat) -> PathBuf {
    dir.join(format!("{}_report.{}", result.tax_id, format.extension()))
}

pub fn save_report(
    dir: &Path,
    result: &ReportResult,
    format: ReportFormat,
) -> Result<PathBuf, JarvisError> {
    fs::create_dir_all(dir).map_err(|err| JarvisError::Filesystem(err.to_string()))?;
    let content = match format {
        ReportFormat::Json => serde_json::to_vec_pretty(result)
            .map_err(|err| JarvisError::Filesystem(err.to_string()))?,
        ReportFormat::Txt => {
            let mut text = result.report.clone().into_bytes();
            text.push(b'\n');
            text
        }
    };
    let path = report_path(dir, result, format);
    let mut temp = tempfile::Builder::new()
        .prefix("bio-jarvis-report")
        .tempfile_in(dir)
        .map_err(|err| JarvisError::Filesystem(err.to_string()))?;
    temp.write_all(&content)
        .map_err(|err| JarvisError::Filesystem(err.to_string()))?;
    temp.persist(&path)
        .map_err(|err| JarvisError::Filesystem(err.to_string()))?;
    Ok(path)
}

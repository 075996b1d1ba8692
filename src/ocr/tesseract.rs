//! Tesseract engine, driven through its command line interface.

use super::{OcrEngine, OcrEngineFactory, OcrLine, OcrPage, OcrWord, OrientationEstimate};
use crate::error::{RedactorError, RedactorResult};
use crate::geometry::Rect;
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Executable to run, `tesseract` from `PATH` when unset.
    pub binary_path: Option<PathBuf>,
    pub lang: String,
    /// Page segmentation mode used for recognition.
    pub psm: u8,
    /// Exported as `TESSDATA_PREFIX` when set.
    pub tessdata_path: Option<PathBuf>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            lang: "eng".to_string(),
            psm: 3,
            tessdata_path: None,
        }
    }
}

impl TesseractConfig {
    fn command(&self) -> Command {
        let binary = self
            .binary_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("tesseract"));
        let mut cmd = Command::new(binary);
        if let Some(tessdata) = &self.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata);
        }
        cmd
    }
}

pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    /// Checks that the binary runs before handing out an engine.
    pub fn new(config: TesseractConfig) -> RedactorResult<Self> {
        let output = config
            .command()
            .arg("--version")
            .output()
            .map_err(|e| RedactorError::OcrInit {
                message: format!("cannot run tesseract: {}", e),
            })?;
        if !output.status.success() {
            return Err(RedactorError::OcrInit {
                message: "tesseract --version failed".to_string(),
            });
        }
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let version = parse_version(&combined).unwrap_or_else(|| "unknown".to_string());
        log::debug!("tesseract {} ready ({})", version, config.lang);
        Ok(Self { config })
    }

    /// Pipes `image` to tesseract as PNG and returns its stdout.
    fn run(&self, image: &RgbImage, args: &[String]) -> RedactorResult<String> {
        let mut png = Cursor::new(Vec::new());
        image.write_to(&mut png, ImageFormat::Png)?;
        let png = png.into_inner();

        let mut child = self
            .config
            .command()
            .arg("stdin")
            .arg("stdout")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RedactorError::BackendError {
                backend: "tesseract".to_string(),
                message: format!("spawn failed: {}", e),
                source: Some(Box::new(e)),
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| RedactorError::BackendError {
            backend: "tesseract".to_string(),
            message: "stdin unavailable".to_string(),
            source: None,
        })?;
        let writer = std::thread::spawn(move || stdin.write_all(&png));

        let output = child.wait_with_output()?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(RedactorError::BackendError {
                    backend: "tesseract".to_string(),
                    message: "stdin writer panicked".to_string(),
                    source: None,
                })
            }
        }
        if !output.status.success() {
            return Err(RedactorError::BackendError {
                backend: "tesseract".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                source: None,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&mut self, image: &RgbImage) -> RedactorResult<OcrPage> {
        let start = Instant::now();
        let args = vec![
            "-l".to_string(),
            self.config.lang.clone(),
            "--psm".to_string(),
            self.config.psm.to_string(),
            "tsv".to_string(),
        ];
        let tsv = self.run(image, &args)?;
        let page = parse_tsv(&tsv);
        log::debug!(
            "tesseract: {} line(s) in {} ms",
            page.lines.len(),
            start.elapsed().as_millis()
        );
        Ok(page)
    }

    fn detect_orientation(
        &mut self,
        image: &RgbImage,
    ) -> RedactorResult<Option<OrientationEstimate>> {
        let args = vec!["--psm".to_string(), "0".to_string()];
        let osd = self.run(image, &args)?;
        Ok(parse_osd(&osd))
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// Creates one [`TesseractEngine`] per pool slot.
#[derive(Debug, Clone, Default)]
pub struct TesseractFactory {
    pub config: TesseractConfig,
}

impl TesseractFactory {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }
}

impl OcrEngineFactory for TesseractFactory {
    fn create(&self, _slot: usize) -> RedactorResult<Box<dyn OcrEngine>> {
        Ok(Box::new(TesseractEngine::new(self.config.clone())?))
    }
}

fn parse_version(text: &str) -> Option<String> {
    text.lines()
        .find(|line| line.contains("tesseract"))
        .and_then(|line| line.split_whitespace().nth(1))
        .map(|v| v.trim_start_matches('v').to_string())
}

/// Groups TSV word rows (level 5) into lines.
///
/// Columns: level, page, block, par, line, word, left, top, width,
/// height, conf, text.
pub fn parse_tsv(tsv: &str) -> OcrPage {
    let mut order: Vec<(u32, u32, u32)> = Vec::new();
    let mut grouped: HashMap<(u32, u32, u32), (Vec<OcrWord>, Vec<f32>)> = HashMap::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let text = cols[11].trim();
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let num = |i: usize| cols[i].parse::<u32>().unwrap_or(0);
        let px = |i: usize| cols[i].parse::<f32>().unwrap_or(0.0);
        let key = (num(2), num(3), num(4));
        let (left, top, width, height) = (px(6), px(7), px(8), px(9));

        let entry = grouped.entry(key).or_insert_with(|| {
            order.push(key);
            (Vec::new(), Vec::new())
        });
        entry.0.push(OcrWord {
            text: text.to_string(),
            bbox: Rect::new(left, top, left + width, top + height),
        });
        entry.1.push(conf / 100.0);
    }

    let lines = order
        .into_iter()
        .filter_map(|key| grouped.remove(&key))
        .filter_map(|(words, confs)| {
            let bbox = words.iter().map(|w| w.bbox).reduce(|a, b| a.union(&b))?;
            let text = words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let confidence = confs.iter().sum::<f32>() / confs.len() as f32;
            Some(OcrLine {
                text,
                bbox,
                confidence,
                words,
            })
        })
        .collect();

    OcrPage { lines }
}

/// Reads `Rotate:` and `Orientation confidence:` from OSD output.
pub fn parse_osd(osd: &str) -> Option<OrientationEstimate> {
    let value = |key: &str| {
        osd.lines()
            .find_map(|line| line.trim().strip_prefix(key))
            .and_then(|v| v.trim().parse::<f32>().ok())
    };
    let rotation_degrees = value("Rotate:")?;
    let confidence = value("Orientation confidence:").unwrap_or(0.0);
    Some(OrientationEstimate {
        rotation_degrees,
        confidence,
    })
}

//! Fixed-size pool of OCR engine instances.
//!
//! Pages are fed through a bounded queue to one long-lived consumer
//! thread per pool slot. A slot takes the next page as soon as it is
//! free, so a slow page never holds up the others. Results come back
//! keyed by page index; completion order does not matter.

use super::{OcrEngine, OcrEngineFactory, OcrPage, OrientationEstimate};
use crate::error::{RedactorError, RedactorResult};
use image::RgbImage;
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;

/// A page raster waiting for recognition.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page: usize,
    pub image: RgbImage,
}

/// Lifecycle of the pool.
pub enum PoolState {
    Uninitialized,
    Initializing,
    Ready(Vec<Box<dyn OcrEngine>>),
}

impl std::fmt::Debug for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Initializing => write!(f, "Initializing"),
            Self::Ready(engines) => write!(f, "Ready({} engines)", engines.len()),
        }
    }
}

#[derive(Debug)]
pub struct OcrPool {
    state: PoolState,
    size: usize,
}

impl OcrPool {
    pub fn new(size: usize) -> Self {
        Self {
            state: PoolState::Uninitialized,
            size: size.max(1),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, PoolState::Ready(_))
    }

    /// Spawns one engine per slot. A no-op when already ready.
    ///
    /// Any failed slot tears the pool back down to `Uninitialized` so a
    /// later call can retry from scratch.
    pub fn initialize(&mut self, factory: &dyn OcrEngineFactory) -> RedactorResult<()> {
        if self.is_ready() {
            return Ok(());
        }
        self.state = PoolState::Initializing;
        log::info!("starting OCR pool with {} engine(s)", self.size);

        let mut engines = Vec::with_capacity(self.size);
        for slot in 0..self.size {
            match factory.create(slot) {
                Ok(engine) => engines.push(engine),
                Err(err) => {
                    self.state = PoolState::Uninitialized;
                    return Err(RedactorError::OcrInit {
                        message: format!("slot {}: {}", slot, err),
                    });
                }
            }
        }
        self.state = PoolState::Ready(engines);
        Ok(())
    }

    fn engines_mut(&mut self) -> RedactorResult<&mut Vec<Box<dyn OcrEngine>>> {
        match &mut self.state {
            PoolState::Ready(engines) => Ok(engines),
            _ => Err(RedactorError::OcrInit {
                message: "OCR pool is not initialized".to_string(),
            }),
        }
    }

    /// Runs the orientation detector of the first slot.
    ///
    /// Must not be called while [`OcrPool::recognize_all`] is running;
    /// the borrow checker enforces this.
    pub fn detect_orientation(
        &mut self,
        image: &RgbImage,
    ) -> RedactorResult<Option<OrientationEstimate>> {
        let engines = self.engines_mut()?;
        match engines.first_mut() {
            Some(engine) => engine.detect_orientation(image),
            None => Ok(None),
        }
    }

    /// Recognizes every page yielded by `jobs`.
    ///
    /// `jobs` is pulled lazily on the calling thread, so page rendering
    /// stays there while the pool slots recognize in parallel. The queue
    /// holds at most one page per slot. `progress` receives
    /// `(completed, total)` after each finished page.
    ///
    /// The first render or recognition error is returned after the
    /// workers have drained; no partial result is returned.
    pub fn recognize_all<I>(
        &mut self,
        jobs: I,
        total: usize,
        progress: &mut dyn FnMut(usize, usize),
    ) -> RedactorResult<BTreeMap<usize, OcrPage>>
    where
        I: Iterator<Item = RedactorResult<PageImage>>,
    {
        let engines = self.engines_mut()?;
        let slots = engines.len();

        let (job_tx, job_rx) = mpsc::sync_channel::<PageImage>(slots);
        let job_rx = Mutex::new(job_rx);
        let (result_tx, result_rx) = mpsc::channel::<(usize, RedactorResult<OcrPage>)>();

        let mut results = BTreeMap::new();
        let mut render_error: Option<RedactorError> = None;
        let mut first_error: Option<RedactorError> = None;
        let mut completed = 0usize;

        thread::scope(|scope| {
            for (slot, engine) in engines.iter_mut().enumerate() {
                let job_rx = &job_rx;
                let result_tx = result_tx.clone();
                scope.spawn(move || loop {
                    let next = match job_rx.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    let Ok(job) = next else {
                        break;
                    };
                    log::debug!("slot {} recognizing page {}", slot, job.page);
                    let outcome = engine.recognize(&job.image);
                    if result_tx.send((job.page, outcome)).is_err() {
                        break;
                    }
                });
            }
            drop(result_tx);

            let mut collect = |page: usize, outcome: RedactorResult<OcrPage>| {
                match outcome {
                    Ok(ocr) => {
                        results.insert(page, ocr);
                    }
                    Err(err) => {
                        log::error!("OCR failed on page {}: {}", page, err);
                        first_error.get_or_insert(RedactorError::Ocr {
                            page,
                            message: err.to_string(),
                        });
                    }
                }
                completed += 1;
                progress(completed, total);
            };

            for job in jobs {
                match job {
                    Ok(job) => {
                        if job_tx.send(job).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        render_error = Some(err);
                        break;
                    }
                }
                while let Ok((page, outcome)) = result_rx.try_recv() {
                    collect(page, outcome);
                }
            }
            drop(job_tx);

            for (page, outcome) in result_rx.iter() {
                collect(page, outcome);
            }
        });

        match render_error.or(first_error) {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}

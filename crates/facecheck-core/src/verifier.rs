//! Video verification: every face in every video must match a reference.
//!
//! The run is a three-state machine. It starts in `Scanning`; the first
//! face that matches no reference moves it to `VideoFailed` and nothing
//! after that frame is examined, in this video or any later one. Running
//! out of frames while still scanning gives `AllPassed`. Faceless frames
//! never move the state.

use crate::comparator::{CompareError, Comparator, ThresholdMatcher};
use crate::provider::{LandmarkProvider, ProviderError};
use crate::signature::{SignatureBuilder, SignatureOutcome, SkipReason};
use crate::types::{MatchResult, ReferenceCollection};
use facecheck_media::{Frame, SourceError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("landmark provider: {0}")]
    Provider(#[from] ProviderError),
    #[error("comparison: {0}")]
    Compare(#[from] CompareError),
    #[error("frame source: {0}")]
    Source(#[from] SourceError),
    #[error("parallel run needs at least one signature builder")]
    NoWorkers,
}

/// The frame that ended the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailurePoint {
    pub video: String,
    /// Zero-based position in the video, counting faceless frames.
    pub frame_index: usize,
    /// Closest reference score, `None` if there were no references.
    pub best_score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifierState {
    Scanning,
    VideoFailed(FailurePoint),
    AllPassed,
}

/// What one frame says about the identity question.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvidence {
    Skipped(SkipReason),
    Matched(MatchResult),
    Unmatched(MatchResult),
}

impl VerifierState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Scanning)
    }

    /// Apply one frame. Terminal states absorb everything.
    pub fn on_frame(self, video: &str, frame_index: usize, evidence: &FrameEvidence) -> Self {
        match (self, evidence) {
            (Self::Scanning, FrameEvidence::Unmatched(result)) => Self::VideoFailed(FailurePoint {
                video: video.to_string(),
                frame_index,
                best_score: result.best_score,
            }),
            (state, _) => state,
        }
    }

    /// No frames left in any video.
    pub fn on_exhausted(self) -> Self {
        match self {
            Self::Scanning => Self::AllPassed,
            state => state,
        }
    }
}

/// Per-video counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoReport {
    pub video: String,
    /// Frames pulled from the source, including the failing one.
    pub frames_examined: usize,
    pub faces_matched: usize,
    pub frames_skipped: usize,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub state: VerifierState,
    pub reference_count: usize,
    /// Videos in input order; videos never reached are absent.
    pub videos: Vec<VideoReport>,
}

impl VerificationReport {
    /// True only for `AllPassed`.
    pub fn verdict(&self) -> bool {
        matches!(self.state, VerifierState::AllPassed)
    }

    pub fn failure(&self) -> Option<&FailurePoint> {
        match &self.state {
            VerifierState::VideoFailed(point) => Some(point),
            _ => None,
        }
    }
}

struct VideoScan {
    report: VideoReport,
    state: VerifierState,
    /// Stopped because another worker already failed the run.
    interrupted: bool,
}

/// Checks videos against a fixed reference collection.
pub struct Verifier<'r, C> {
    references: &'r ReferenceCollection,
    matcher: ThresholdMatcher<C>,
}

impl<'r, C: Comparator> Verifier<'r, C> {
    pub fn new(references: &'r ReferenceCollection, matcher: ThresholdMatcher<C>) -> Self {
        if references.is_empty() {
            tracing::warn!("reference collection is empty; any detected face fails verification");
        }
        Self {
            references,
            matcher,
        }
    }

    /// Build a signature for one frame and classify it.
    pub fn evaluate<P: LandmarkProvider>(
        &self,
        builder: &mut SignatureBuilder<P>,
        frame: &Frame,
    ) -> Result<FrameEvidence, VerifyError> {
        Ok(match builder.build(frame)? {
            SignatureOutcome::Skipped(reason) => FrameEvidence::Skipped(reason),
            SignatureOutcome::Face(signature) => {
                let result = self.matcher.compare(&signature, self.references)?;
                if result.matched {
                    FrameEvidence::Matched(result)
                } else {
                    FrameEvidence::Unmatched(result)
                }
            }
        })
    }

    /// Scan a single video in isolation. The returned state is either
    /// `VideoFailed` or `AllPassed`.
    pub fn verify_video<P, F>(
        &self,
        builder: &mut SignatureBuilder<P>,
        video: &str,
        frames: F,
    ) -> Result<(VideoReport, VerifierState), VerifyError>
    where
        P: LandmarkProvider,
        F: IntoIterator<Item = Result<Frame, SourceError>>,
    {
        let scan = self.scan_video(builder, video, frames, None)?;
        Ok((scan.report, scan.state.on_exhausted()))
    }

    /// Scan videos in order, stopping at the first unmatched face.
    pub fn run<P, V, S, F>(
        &self,
        builder: &mut SignatureBuilder<P>,
        videos: V,
    ) -> Result<VerificationReport, VerifyError>
    where
        P: LandmarkProvider,
        V: IntoIterator<Item = (S, F)>,
        S: Into<String>,
        F: IntoIterator<Item = Result<Frame, SourceError>>,
    {
        let mut state = VerifierState::Scanning;
        let mut reports = Vec::new();

        for (video, frames) in videos {
            let video = video.into();
            let scan = self.scan_video(builder, &video, frames, None)?;
            reports.push(scan.report);
            state = scan.state;
            if state.is_terminal() {
                break;
            }
        }

        Ok(self.finish(state.on_exhausted(), reports))
    }

    /// Scan videos on one worker thread per builder, with the same
    /// fail-fast rule: once any worker sees an unmatched face, no worker
    /// starts another frame.
    ///
    /// When several videos fail concurrently, the earliest in input order
    /// among those that reached a failing frame is reported. An earlier
    /// video may be interrupted before its own failing frame.
    pub fn run_parallel<P, V, S, F>(
        &self,
        builders: &mut [SignatureBuilder<P>],
        videos: V,
    ) -> Result<VerificationReport, VerifyError>
    where
        C: Sync,
        P: LandmarkProvider + Send,
        V: IntoIterator<Item = (S, F)>,
        V::IntoIter: Send,
        S: Into<String>,
        F: IntoIterator<Item = Result<Frame, SourceError>>,
    {
        if builders.is_empty() {
            return Err(VerifyError::NoWorkers);
        }

        let failed = AtomicBool::new(false);
        let queue = Mutex::new(videos.into_iter().enumerate());
        let reports: Mutex<Vec<(usize, VideoReport)>> = Mutex::new(Vec::new());
        let failure: Mutex<Option<(usize, FailurePoint)>> = Mutex::new(None);
        let error: Mutex<Option<VerifyError>> = Mutex::new(None);

        std::thread::scope(|scope| {
            for (worker, builder) in builders.iter_mut().enumerate() {
                let (failed, queue, reports, failure, error) = (&failed, &queue, &reports, &failure, &error);
                scope.spawn(move || {
                    tracing::debug!(worker, "verifier worker started");
                    while !failed.load(Ordering::Acquire) {
                        let next = lock(queue).next();
                        let Some((index, (video, frames))) = next else {
                            break;
                        };
                        let video = video.into();
                        match self.scan_video(builder, &video, frames, Some(failed)) {
                            Ok(scan) if scan.interrupted => break,
                            Ok(scan) => {
                                if let VerifierState::VideoFailed(point) = scan.state {
                                    failed.store(true, Ordering::Release);
                                    let mut slot = lock(failure);
                                    if slot.as_ref().map_or(true, |(i, _)| index < *i) {
                                        *slot = Some((index, point));
                                    }
                                }
                                lock(reports).push((index, scan.report));
                            }
                            Err(e) => {
                                failed.store(true, Ordering::Release);
                                lock(error).get_or_insert(e);
                                break;
                            }
                        }
                    }
                    tracing::debug!(worker, "verifier worker exiting");
                });
            }
        });

        if let Some(e) = into_inner(error) {
            return Err(e);
        }

        let mut reports = into_inner(reports);
        reports.sort_by_key(|(index, _)| *index);
        let reports = reports.into_iter().map(|(_, report)| report).collect();

        let state = match into_inner(failure) {
            Some((_, point)) => VerifierState::VideoFailed(point),
            None => VerifierState::AllPassed,
        };
        Ok(self.finish(state, reports))
    }

    fn scan_video<P, F>(
        &self,
        builder: &mut SignatureBuilder<P>,
        video: &str,
        frames: F,
        cancel: Option<&AtomicBool>,
    ) -> Result<VideoScan, VerifyError>
    where
        P: LandmarkProvider,
        F: IntoIterator<Item = Result<Frame, SourceError>>,
    {
        let mut state = VerifierState::Scanning;
        let mut report = VideoReport {
            video: video.to_string(),
            ..Default::default()
        };

        for (index, frame) in frames.into_iter().enumerate() {
            if cancel.is_some_and(|c| c.load(Ordering::Acquire)) {
                tracing::debug!(video, frame = index, "scan interrupted");
                return Ok(VideoScan {
                    report,
                    state,
                    interrupted: true,
                });
            }

            let frame = frame?;
            report.frames_examined += 1;
            let evidence = self.evaluate(builder, &frame)?;
            match &evidence {
                FrameEvidence::Skipped(reason) => {
                    tracing::trace!(video, frame = index, ?reason, "frame skipped");
                    report.frames_skipped += 1;
                }
                FrameEvidence::Matched(result) => {
                    tracing::trace!(video, frame = index, score = ?result.best_score, "frame matched");
                    report.faces_matched += 1;
                }
                FrameEvidence::Unmatched(_) => {}
            }

            state = state.on_frame(video, index, &evidence);
            if let VerifierState::VideoFailed(point) = &state {
                tracing::info!(
                    video,
                    frame = point.frame_index,
                    best_score = ?point.best_score,
                    threshold = self.matcher.threshold(),
                    "unmatched face, video failed"
                );
                return Ok(VideoScan {
                    report,
                    state,
                    interrupted: false,
                });
            }
        }

        report.passed = true;
        tracing::info!(
            video,
            frames = report.frames_examined,
            matched = report.faces_matched,
            skipped = report.frames_skipped,
            "video passed"
        );
        Ok(VideoScan {
            report,
            state,
            interrupted: false,
        })
    }

    fn finish(&self, state: VerifierState, videos: Vec<VideoReport>) -> VerificationReport {
        VerificationReport {
            state,
            reference_count: self.references.len(),
            videos,
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn into_inner<T>(m: Mutex<T>) -> T {
    m.into_inner().unwrap_or_else(PoisonError::into_inner)
}

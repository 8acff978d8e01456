//! Submission entry points.
//!
//! One submission is one uploaded file taken all the way to a parsed
//! [`ExtractionResult`]: acquire, rasterize or extract text, build the
//! request, make exactly one extraction call, parse the reply. Nothing is
//! retried; the first failure ends the submission.
//!
//! `Ok(None)` means there was nothing to submit (an empty image sequence or a
//! blank text file). No request is sent in that case.

use crate::error::{CallKind, QuizError};
use crate::observer::{SubmissionState, SubmissionTracker};
use crate::pipeline::input::{self, Acquired, UploadedFile};
use crate::pipeline::payload::{self, ExtractionRequest, SubmissionContent};
use crate::pipeline::raster::{self, Rasterizer};
use crate::pipeline::reply::{self, ExtractionResult};
use crate::session::Session;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Build the request for already-acquired content and run the extraction call.
pub async fn submit(
    session: &Session,
    content: SubmissionContent,
) -> Result<Option<ExtractionResult>, QuizError> {
    let Some(request) = payload::build_request(session.config().instruction(), content) else {
        info!("Nothing to submit");
        return Ok(None);
    };
    let reply = call_extraction(session, &request).await?;
    reply::parse_reply(&reply).map(Some)
}

/// Run one file through the whole pipeline with no observer.
pub async fn extract(
    session: &Session,
    rasterizer: &dyn Rasterizer,
    file: UploadedFile,
) -> Result<Option<ExtractionResult>, QuizError> {
    let mut tracker = SubmissionTracker::default();
    run_submission(session, rasterizer, file, &mut tracker).await
}

/// Run one file through the whole pipeline, reporting each state change to
/// `tracker`.
///
/// On success the tracker is left in [`SubmissionState::Parsed`]; rendering
/// and answer checking are the caller's steps. Failures before the model call
/// return the tracker to [`SubmissionState::Idle`].
pub async fn run_submission(
    session: &Session,
    rasterizer: &dyn Rasterizer,
    file: UploadedFile,
    tracker: &mut SubmissionTracker,
) -> Result<Option<ExtractionResult>, QuizError> {
    let start = Instant::now();

    // ── Step 1: Acquire ──────────────────────────────────────────────────
    let acquired = input::acquire(session, file).map_err(|e| back_to_idle(tracker, e))?;
    tracker.advance(SubmissionState::FileAcquired);

    // ── Step 2: Rasterize or take the decoded text ───────────────────────
    let content = match acquired {
        Acquired::Vision(file) => {
            tracker.advance(SubmissionState::Rasterizing);
            let (sender, handoff) = raster::handoff();
            rasterizer.start(file, sender);
            let images = handoff.wait().await.map_err(|e| back_to_idle(tracker, e))?;
            tracker.observer().on_pages(images.len());
            SubmissionContent::Images(images)
        }
        Acquired::Text(text) => {
            tracker.advance(SubmissionState::TextExtracting);
            SubmissionContent::Text(text)
        }
    };

    // ── Step 3: Build payload ────────────────────────────────────────────
    let Some(request) = payload::build_request(session.config().instruction(), content) else {
        info!("Nothing to submit; no request sent");
        tracker.advance(SubmissionState::Idle);
        return Ok(None);
    };
    tracker.advance(SubmissionState::PayloadBuilt);

    // ── Step 4: Call the model ───────────────────────────────────────────
    tracker.advance(SubmissionState::AwaitingModel);
    let reply = match call_extraction(session, &request).await {
        Ok(r) => r,
        Err(e) => {
            tracker.fail(SubmissionState::TransportError, &e.to_string());
            return Err(e);
        }
    };

    // ── Step 5: Parse ────────────────────────────────────────────────────
    let result = match reply::parse_reply(&reply) {
        Ok(r) => r,
        Err(e) => {
            tracker.fail(SubmissionState::ParseError, &e.to_string());
            return Err(e);
        }
    };
    tracker.advance(SubmissionState::Parsed);

    info!(
        "Submission done in {:?}: {} questions",
        start.elapsed(),
        result.qna.len()
    );
    Ok(Some(result))
}

async fn call_extraction(
    session: &Session,
    request: &ExtractionRequest,
) -> Result<String, QuizError> {
    debug!(
        "Sending extraction request: {} parts, {} images",
        request.parts().len(),
        request.image_count()
    );
    session
        .provider()
        .complete(CallKind::Extraction, request)
        .await
}

fn back_to_idle(tracker: &mut SubmissionTracker, err: QuizError) -> QuizError {
    warn!("Submission abandoned: {}", err);
    if tracker.state() != SubmissionState::Idle {
        tracker.advance(SubmissionState::Idle);
    }
    tracker
        .observer()
        .on_error(SubmissionState::Idle, &err.to_string());
    err
}

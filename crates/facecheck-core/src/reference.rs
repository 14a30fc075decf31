//! Builds the reference collection from known-good images.

use crate::provider::{LandmarkProvider, ProviderError};
use crate::signature::{SignatureBuilder, SignatureOutcome};
use crate::types::{ReferenceCollection, ReferenceFace};
use facecheck_media::Frame;

/// Build one signature per reference image that yields a usable face.
///
/// Images without a face (or with degenerate landmarks) are skipped. An
/// empty result is returned, not rejected; the verifier then fails on the
/// first face it sees.
pub fn build_reference_collection<P, I, L>(
    builder: &mut SignatureBuilder<P>,
    images: I,
) -> Result<ReferenceCollection, ProviderError>
where
    P: LandmarkProvider,
    I: IntoIterator<Item = (L, Frame)>,
    L: Into<String>,
{
    let mut faces = Vec::new();
    let mut skipped = 0usize;

    for (label, frame) in images {
        let label = label.into();
        match builder.build(&frame)? {
            SignatureOutcome::Face(signature) => faces.push(ReferenceFace { label, signature }),
            SignatureOutcome::Skipped(reason) => {
                tracing::debug!(image = %label, ?reason, "reference image skipped");
                skipped += 1;
            }
        }
    }

    tracing::info!(accepted = faces.len(), skipped, "reference collection built");
    if faces.is_empty() {
        tracing::warn!("no usable reference faces; every face in the videos will be rejected");
    }

    Ok(ReferenceCollection::new(faces))
}

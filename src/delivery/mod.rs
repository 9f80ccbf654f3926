//! Size-tiered delivery policy
//!
//! Decides, for a finished artifact, whether it is delivered at all, through
//! which Bot API method, and what the user is told about reliability:
//!
//! | Tier         | Size                       | Transport               | Marker |
//! |--------------|----------------------------|-------------------------|--------|
//! | `Safe`       | `<= safe_limit_mb`         | video / audio / document| ✅     |
//! | `BestEffort` | `(safe, hard_limit_mb]`    | document                | ⚠️     |
//! | `Rejected`   | `> hard_limit_mb`          | none                    | ❌     |
//!
//! Everything here is pure and can be called from any task.

pub mod artifact;
pub mod formats;
pub mod policy;
pub mod transport;

pub use artifact::{Artifact, MediaKind};
pub use formats::{build_format_choices, Container, FormatChoice, FormatError, RawFormat};
pub use policy::{classify, format_mb, SizePolicy, Tier, MB_BYTES};
pub use transport::{select_transport, Confidence, Delivery, Rejection, Transport, TransportChoice};

/// Classifies an artifact and selects its transport in one step.
///
/// Rejections produced here carry the artifact size and the hard limit so
/// the refusal message can show both.
pub fn plan(artifact: &Artifact, policy: &SizePolicy) -> (Tier, Delivery) {
    let tier = classify(artifact.size_bytes, policy);
    let delivery = match select_transport(artifact.kind, tier) {
        Delivery::Reject(_) => Delivery::Reject(Rejection::with_details(artifact.size_bytes, policy.hard_limit_mb())),
        deliver => deliver,
    };
    (tier, delivery)
}

/// Legend explaining the three markers with the configured limits.
pub fn tier_legend(policy: &SizePolicy) -> String {
    format!(
        "{} up to {} MB: sent as video/audio, reliable\n{} {}–{} MB: sent as a document, may fail\n{} over {} MB: not sent",
        Tier::Safe.marker(),
        policy.safe_limit_mb(),
        Tier::BestEffort.marker(),
        policy.safe_limit_mb(),
        policy.hard_limit_mb(),
        Tier::Rejected.marker(),
        policy.hard_limit_mb(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plan_attaches_rejection_details() {
        let policy = SizePolicy::new(50, 2000).unwrap();
        let artifact = Artifact::new("/tmp/x.mp4", 2001 * MB_BYTES, MediaKind::Video);

        let (tier, delivery) = plan(&artifact, &policy);

        assert_eq!(tier, Tier::Rejected);
        assert_eq!(
            delivery,
            Delivery::Reject(Rejection::with_details(2001 * MB_BYTES, 2000))
        );
    }

    #[test]
    fn test_tier_legend_lists_limits() {
        let policy = SizePolicy::new(50, 2000).unwrap();
        let legend = tier_legend(&policy);
        assert!(legend.contains("✅ up to 50 MB"));
        assert!(legend.contains("⚠️ 50–2000 MB"));
        assert!(legend.contains("❌ over 2000 MB"));
    }
}

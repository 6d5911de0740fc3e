//! Property-based tests for cache keys and progress mapping

use gifscrub::core::frame_index;
use gifscrub::SourceDescriptor;
use proptest::prelude::*;

fn descriptor() -> impl Strategy<Value = SourceDescriptor> {
    prop_oneof![
        ("[a-z]{1,12}", proptest::collection::vec(("[A-Za-z-]{1,8}", "[ -~]{0,8}"), 0..3))
            .prop_map(|(host, headers)| SourceDescriptor::network_with_headers(
                format!("https://{}.example/img.gif", host),
                headers
            )),
        ("[a-z/]{1,16}", proptest::option::of("[a-z]{1,6}"))
            .prop_map(|(name, package)| SourceDescriptor::Asset { name, package }),
        "/nonexistent/[a-z]{1,12}\\.gif".prop_map(|p| SourceDescriptor::file(p)),
        proptest::collection::vec(any::<u8>(), 0..64).prop_map(|b| SourceDescriptor::memory(b)),
    ]
}

/// Same variant and payload -> same key
#[test]
fn test_key_stability_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&descriptor(), |d| {
            let copy = d.clone();
            assert_eq!(d.key(), copy.key());
            assert_eq!(d.key(), d.key());
            Ok(())
        })
        .unwrap();
}

/// Different variants never share a key
#[test]
fn test_cross_variant_keys_never_collide() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(descriptor(), descriptor()), |(a, b)| {
            if a.kind() != b.kind() {
                assert_ne!(a.key(), b.key());
            }
            Ok(())
        })
        .unwrap();
}

/// Memory keys follow content: equal bytes share, different bytes don't
#[test]
fn test_memory_key_tracks_content() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(any::<Vec<u8>>(), any::<Vec<u8>>()),
            |(x, y)| {
                let kx = SourceDescriptor::memory(x.clone()).key();
                let ky = SourceDescriptor::memory(y.clone()).key();
                if x == y {
                    assert_eq!(kx, ky);
                } else {
                    assert_ne!(kx, ky);
                }
                Ok(())
            },
        )
        .unwrap();
}

/// Endpoints hit the first and last frame, and the index never goes back
/// while progress moves forward
#[test]
fn test_index_mapping_bounds_and_monotonic() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(1usize..500, proptest::collection::vec(0.0f64..=1.0, 1..40)),
            |(n, mut ps)| {
                assert_eq!(frame_index(n, 0.0), 0);
                assert_eq!(frame_index(n, 1.0), n - 1);

                ps.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let indices: Vec<usize> = ps.iter().map(|&p| frame_index(n, p)).collect();
                assert!(indices.windows(2).all(|w| w[0] <= w[1]));
                assert!(indices.iter().all(|&i| i < n));
                Ok(())
            },
        )
        .unwrap();
}

//! Receiver pairs for instance solutions.

use crate::env::OutputCapturer;
use crate::error::{GradeError, GradeResult};
use crate::generators::{GenScope, Strategy};
use crate::model::{Thrown, Value};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

/// A reference receiver and the submission receiver built from the same seed.
#[derive(Debug, Clone)]
pub struct ReceiverPair {
    /// Reference-side receiver; `None` when both constructions threw alike.
    pub reference: Option<Value>,
    /// Submission-side receiver.
    pub submission: Option<Value>,
    /// Whether tests may still run on this pair.
    pub ready: bool,
}

/// Receiver pairs drawn from during a run.
#[derive(Debug, Clone, Default)]
pub struct ReceiverPool {
    pairs: Vec<ReceiverPair>,
    static_only: bool,
}

impl ReceiverPool {
    /// Pool for static solutions: one receiverless pair that never retires.
    pub fn single() -> Self {
        Self {
            pairs: vec![ReceiverPair {
                reference: None,
                submission: None,
                ready: true,
            }],
            static_only: true,
        }
    }

    /// Build `count` ready pairs, trying at most `retries` times per pair.
    ///
    /// Each attempt draws a seed and builds one receiver per side with it.
    /// When both sides build, the pair is ready. When both throw the same
    /// kind of failure, the pair is ready with no receivers, so the
    /// solution is exercised on a null receiver on both sides. A reference
    /// generator reaching a non-public member is an error in the question.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        reference: &GenScope<'_>,
        submission: &GenScope<'_>,
        strategy: &Strategy,
        count: u32,
        retries: u32,
        max_complexity: u32,
        rng: &mut ChaCha8Rng,
        capturer: &dyn OutputCapturer,
    ) -> GradeResult<Self> {
        let attempts = count.saturating_mul(retries.max(1));
        let mut pairs = Vec::with_capacity(count as usize);
        let mut attempt = 0;
        while attempt < attempts && pairs.len() < count as usize {
            let seed = rng.next_u64();
            let complexity = attempt.min(max_complexity);
            attempt += 1;

            let mut built: Option<(Result<Value, Thrown>, Result<Value, Thrown>)> = None;
            // Whatever constructors print is not part of any test.
            capturer.run_capturing_output(&mut || {
                let mut ours = ChaCha8Rng::seed_from_u64(seed);
                let mut theirs = ChaCha8Rng::seed_from_u64(seed);
                built = Some((
                    strategy.generate(reference, complexity, &mut ours),
                    strategy.generate(submission, complexity, &mut theirs),
                ));
            });
            let Some((ours, theirs)) = built else {
                continue;
            };

            match (ours, theirs) {
                (Ok(r), Ok(s)) => pairs.push(ReceiverPair {
                    reference: Some(r),
                    submission: Some(s),
                    ready: true,
                }),
                (Err(r), _) if is_access_violation(&r) => {
                    return Err(GradeError::Fatal(format!(
                        "receiver generator reached a non-public member: {}",
                        r
                    )));
                }
                (Err(r), Err(s)) if r.kind == s.kind => pairs.push(ReceiverPair {
                    reference: None,
                    submission: None,
                    ready: true,
                }),
                (ours, theirs) => {
                    debug!(attempt, reference = ?ours.err(), submission = ?theirs.err(), "receiver attempt skipped");
                }
            }
        }

        if pairs.len() < count as usize {
            warn!(wanted = count, built = pairs.len(), attempts, "receiver quota not met");
            return Err(GradeError::Fatal(format!(
                "could only build {} of {} receivers in {} attempts",
                pairs.len(),
                count,
                attempts
            )));
        }
        debug!(count = pairs.len(), attempts = attempt, "receiver pool built");
        Ok(Self {
            pairs,
            static_only: false,
        })
    }

    /// Index of a uniformly chosen ready pair.
    pub fn pick(&self, rng: &mut ChaCha8Rng) -> Option<usize> {
        let ready: Vec<usize> = self
            .pairs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.ready)
            .map(|(i, _)| i)
            .collect();
        if ready.is_empty() {
            return None;
        }
        Some(ready[rng.gen_range(0..ready.len())])
    }

    /// The pair at `index`.
    pub fn pair(&self, index: usize) -> Option<&ReceiverPair> {
        self.pairs.get(index)
    }

    /// Stop drawing the pair at `index`; its receivers disagree.
    /// The receiverless static pair never retires.
    pub fn mark_not_ready(&mut self, index: usize) {
        if self.static_only {
            return;
        }
        if let Some(pair) = self.pairs.get_mut(index) {
            pair.ready = false;
        }
    }

    /// Pairs still usable.
    pub fn ready_count(&self) -> usize {
        self.pairs.iter().filter(|p| p.ready).count()
    }
}

fn is_access_violation(thrown: &Thrown) -> bool {
    thrown.kind == "IllegalAccessError"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ThreadCapturer;
    use crate::generators::{gen_fn, GeneratorConfig, GeneratorRegistry};
    use crate::model::{ClassDef, ClassSpace, ConstructorDef, FieldDef, Modifier, TypeRef};
    use std::sync::Arc;

    fn space(label: &str, public_ctor: bool) -> Arc<ClassSpace> {
        let space = ClassSpace::new(label);
        let ctor = if public_ctor {
            ConstructorDef::public()
        } else {
            ConstructorDef::new().with(Modifier::Private)
        };
        space
            .define(
                ClassDef::public_class("Counter")
                    .field(FieldDef::public("count", TypeRef::Int))
                    .constructor(ctor),
            )
            .unwrap();
        space
    }

    fn registry(space: &Arc<ClassSpace>, config: GeneratorConfig) -> GeneratorRegistry {
        GeneratorRegistry::new("Counter", Arc::clone(space), "Counter", config, 8).unwrap()
    }

    #[test]
    fn test_builds_ready_pairs() {
        let reference = space("reference", true);
        let submission = space("submission", true);
        let reg = registry(&reference, GeneratorConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let pool = ReceiverPool::build(
            &GenScope::new(&reference, &reg),
            &GenScope::new(&submission, &reg),
            &Strategy::Construct("Counter".into()),
            4,
            2,
            10,
            &mut rng,
            &ThreadCapturer,
        )
        .unwrap();
        assert_eq!(pool.ready_count(), 4);
        let index = pool.pick(&mut rng).unwrap();
        assert!(pool.pair(index).unwrap().reference.is_some());
    }

    #[test]
    fn test_mark_not_ready_and_static_pair() {
        let mut pool = ReceiverPool {
            pairs: vec![
                ReceiverPair {
                    reference: None,
                    submission: None,
                    ready: true,
                };
                2
            ],
            static_only: false,
        };
        pool.mark_not_ready(0);
        assert_eq!(pool.ready_count(), 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(pool.pick(&mut rng), Some(1));
        pool.mark_not_ready(1);
        assert_eq!(pool.pick(&mut rng), None);

        let mut single = ReceiverPool::single();
        single.mark_not_ready(0);
        assert_eq!(single.ready_count(), 1);
    }

    #[test]
    fn test_quota_failure_is_fatal() {
        let reference = space("reference", true);
        let submission = space("submission", false);
        let reg = registry(&reference, GeneratorConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let err = ReceiverPool::build(
            &GenScope::new(&reference, &reg),
            &GenScope::new(&submission, &reg),
            &Strategy::Construct("Counter".into()),
            2,
            3,
            10,
            &mut rng,
            &ThreadCapturer,
        )
        .unwrap_err();
        assert!(matches!(err, GradeError::Fatal(_)));
    }

    #[test]
    fn test_same_failure_on_both_sides_is_ready() {
        let reference = space("reference", true);
        let submission = space("submission", true);
        let reg = registry(&reference, GeneratorConfig::default());
        let failing = Strategy::Custom(gen_fn(|_, _, _| Err(Thrown::bare("IllegalStateException"))));
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let pool = ReceiverPool::build(
            &GenScope::new(&reference, &reg),
            &GenScope::new(&submission, &reg),
            &failing,
            3,
            1,
            10,
            &mut rng,
            &ThreadCapturer,
        )
        .unwrap();
        assert_eq!(pool.ready_count(), 3);
        assert!(pool.pair(0).unwrap().reference.is_none());
    }
}

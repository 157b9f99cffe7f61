//! Enumeration of declared edge and simple cases without repetition.
//!
//! Each parameter contributes a list of choices. A combination is a
//! mixed-radix index over those lists, and combinations are drawn through an
//! incremental Fisher-Yates shuffle so every one is visited at most once
//! without materializing the whole product.

use super::registry::GeneratorDescriptor;
use crate::model::Value;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// How one argument of a test case is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgRecipe {
    /// A declared case value, handed to both sides as is.
    Fixed(Value),
    /// Generated on each side from the case seed at this complexity.
    Generate(u32),
}

/// Which declared cases to combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    /// Edge values only.
    Edge,
    /// Simple values only.
    Simple,
    /// At least one edge and at least one simple value.
    Mixed,
}

#[derive(Debug, Clone, PartialEq)]
enum Choice {
    Edge(Value),
    Simple(Value),
    Fallback,
}

/// Draws declared-case combinations in random order, each at most once.
#[derive(Debug, Clone)]
pub struct CaseEnumerator {
    mode: CaseMode,
    choices: Vec<Vec<Choice>>,
    total: u64,
    drawn: u64,
    swaps: HashMap<u64, u64>,
}

impl CaseEnumerator {
    /// Enumerator over the cases of `params`. Parameters without cases of
    /// the requested kind fall back to their generator at complexity zero.
    pub fn new(mode: CaseMode, params: &[Arc<GeneratorDescriptor>]) -> Self {
        let choices: Vec<Vec<Choice>> = params
            .iter()
            .map(|descriptor| {
                let edge = descriptor.edge.iter().flatten().cloned().map(Choice::Edge);
                let simple = descriptor.simple.iter().flatten().cloned().map(Choice::Simple);
                let mut list: Vec<Choice> = match mode {
                    CaseMode::Edge => edge.collect(),
                    CaseMode::Simple => simple.collect(),
                    CaseMode::Mixed => edge.chain(simple).collect(),
                };
                if list.is_empty() {
                    list.push(Choice::Fallback);
                }
                list
            })
            .collect();

        let has = |pick: fn(&Choice) -> bool| choices.iter().flatten().any(pick);
        let usable = match mode {
            CaseMode::Edge => has(|c| matches!(c, Choice::Edge(_))),
            CaseMode::Simple => has(|c| matches!(c, Choice::Simple(_))),
            CaseMode::Mixed => {
                has(|c| matches!(c, Choice::Edge(_))) && has(|c| matches!(c, Choice::Simple(_)))
            }
        };
        let total = if usable {
            choices
                .iter()
                .try_fold(1u64, |acc, list| acc.checked_mul(list.len() as u64))
                .unwrap_or(u64::MAX)
        } else {
            0
        };

        Self {
            mode,
            choices,
            total,
            drawn: 0,
            swaps: HashMap::new(),
        }
    }

    /// Combinations not yet drawn (an upper bound for mixed mode).
    pub fn remaining(&self) -> u64 {
        self.total - self.drawn
    }

    /// Whether no combination is left.
    pub fn is_spent(&self) -> bool {
        self.remaining() == 0
    }

    /// Draw the next unseen combination, or `None` when all are spent.
    pub fn next(&mut self, rng: &mut ChaCha8Rng) -> Option<Vec<ArgRecipe>> {
        while self.drawn < self.total {
            let index = self.draw_index(rng);
            let picked = self.decode(index);
            if self.mode != CaseMode::Mixed || is_mixed(&picked) {
                return Some(picked.into_iter().map(to_recipe).collect());
            }
        }
        None
    }

    fn draw_index(&mut self, rng: &mut ChaCha8Rng) -> u64 {
        let j = rng.gen_range(self.drawn..self.total);
        let at_j = self.swaps.get(&j).copied().unwrap_or(j);
        let at_front = self.swaps.get(&self.drawn).copied().unwrap_or(self.drawn);
        self.swaps.insert(j, at_front);
        self.swaps.remove(&self.drawn);
        self.drawn += 1;
        at_j
    }

    fn decode(&self, mut index: u64) -> Vec<&Choice> {
        let mut picked = Vec::with_capacity(self.choices.len());
        for list in &self.choices {
            let radix = list.len() as u64;
            picked.push(&list[(index % radix) as usize]);
            index /= radix;
        }
        picked
    }
}

fn is_mixed(picked: &[&Choice]) -> bool {
    picked.iter().any(|c| matches!(c, Choice::Edge(_)))
        && picked.iter().any(|c| matches!(c, Choice::Simple(_)))
}

fn to_recipe(choice: &Choice) -> ArgRecipe {
    match choice {
        Choice::Edge(value) | Choice::Simple(value) => ArgRecipe::Fixed(value.clone()),
        Choice::Fallback => ArgRecipe::Generate(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::registry::Strategy;
    use crate::model::TypeRef;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn descriptor(edge: Option<Vec<i32>>, simple: Option<Vec<i32>>) -> Arc<GeneratorDescriptor> {
        let wrap = |v: Option<Vec<i32>>| v.map(|v| v.into_iter().map(Value::Int).collect());
        Arc::new(GeneratorDescriptor {
            ty: TypeRef::Int,
            edge: wrap(edge),
            simple: wrap(simple),
            strategy: Strategy::Builtin(TypeRef::Int),
            constructible: true,
        })
    }

    fn drain(enumerator: &mut CaseEnumerator) -> Vec<Vec<ArgRecipe>> {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut out = Vec::new();
        while let Some(case) = enumerator.next(&mut rng) {
            out.push(case);
        }
        out
    }

    #[test]
    fn test_edge_product_without_repeats() {
        let params = vec![descriptor(Some(vec![0, 1, 2]), None), descriptor(Some(vec![5, 6]), None)];
        let mut enumerator = CaseEnumerator::new(CaseMode::Edge, &params);
        let cases = drain(&mut enumerator);
        assert_eq!(cases.len(), 6);
        let unique: HashSet<String> = cases.iter().map(|c| format!("{:?}", c)).collect();
        assert_eq!(unique.len(), 6);
        assert!(enumerator.is_spent());
    }

    #[test]
    fn test_missing_cases_fall_back_to_generation() {
        let params = vec![descriptor(Some(vec![0]), None), descriptor(None, None)];
        let cases = drain(&mut CaseEnumerator::new(CaseMode::Edge, &params));
        assert_eq!(
            cases,
            vec![vec![ArgRecipe::Fixed(Value::Int(0)), ArgRecipe::Generate(0)]]
        );
    }

    #[test]
    fn test_no_cases_means_spent() {
        let params = vec![descriptor(None, Some(vec![1]))];
        assert!(CaseEnumerator::new(CaseMode::Edge, &params).is_spent());
        assert!(CaseEnumerator::new(CaseMode::Mixed, &params).is_spent());
        assert!(CaseEnumerator::new(CaseMode::Edge, &[]).is_spent());
    }

    #[test]
    fn test_mixed_combines_both_kinds() {
        let params = vec![descriptor(Some(vec![0]), Some(vec![-1, 1])), descriptor(Some(vec![0]), Some(vec![7]))];
        let cases = drain(&mut CaseEnumerator::new(CaseMode::Mixed, &params));
        // 3 x 2 combinations, minus all-edge (0,0) and the two all-simple ones.
        assert_eq!(cases.len(), 3);
        for case in cases {
            assert!(case.contains(&ArgRecipe::Fixed(Value::Int(0))));
        }
    }
}

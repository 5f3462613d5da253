//! Random forest over smartcore decision trees
//!
//! Every member is a gini `DecisionTreeClassifier` grown on a bootstrap
//! sample of the rows and a random subspace of the columns. Class
//! probabilities are the fraction of members voting for each class.

use super::{labels_from_proba, to_dense, ClassIndex, TrainedModel};
use crate::classifiers::metadata::ClassifierTag;
use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};

type Tree = DecisionTreeClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

#[derive(Debug, Clone)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Columns given to each tree; `None` means half of them, at least `sqrt(n_features)`
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 0,
        }
    }
}

enum Member {
    Tree { model: Tree, columns: Vec<usize> },
    /// The bootstrap sample held a single class
    Constant(usize),
}

impl Member {
    fn votes(&self, x: ArrayView2<f64>) -> Result<Vec<usize>> {
        match self {
            Member::Tree { model, columns } => {
                let matrix = to_dense(ClassifierTag::RF, x.select(Axis(1), columns).view())?;
                let predicted = model
                    .predict(&matrix)
                    .map_err(|e| BenchError::fit(ClassifierTag::RF, e))?;
                Ok(predicted.into_iter().map(|c| c as usize).collect())
            }
            Member::Constant(class) => Ok(vec![*class; x.nrows()]),
        }
    }
}

pub struct RandomForest {
    members: Vec<Member>,
    classes: ClassIndex,
    n_features: usize,
}

impl RandomForest {
    /// Fit members in parallel; member `i` draws from its own seeded generator.
    pub fn fit(
        x: ArrayView2<f64>,
        y: &Array1<usize>,
        n_classes: usize,
        params: &RandomForestParams,
    ) -> Result<Self> {
        let classes = ClassIndex::from_labels(y, n_classes);
        classes.require_two(ClassifierTag::RF)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let subspace = params
            .max_features
            .unwrap_or_else(|| (n_features / 2).max((n_features as f64).sqrt() as usize))
            .clamp(1, n_features);
        let tree_params = DecisionTreeClassifierParameters {
            criterion: SplitCriterion::Gini,
            max_depth: params.max_depth.map(|d| d.min(u16::MAX as usize) as u16),
            min_samples_leaf: params.min_samples_leaf.max(1),
            min_samples_split: params.min_samples_split.max(2),
            seed: None,
        };

        let members = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let seed = params.seed.wrapping_add(i as u64);
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
                let rows: Vec<usize> = if params.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let mut columns =
                    rand::seq::index::sample(&mut rng, n_features, subspace).into_vec();
                columns.sort_unstable();

                let labels: Vec<u32> = rows.iter().map(|&r| y[r] as u32).collect();
                if labels.iter().all(|&l| l == labels[0]) {
                    return Ok(Member::Constant(labels[0] as usize));
                }
                let sample = x.select(Axis(0), &rows).select(Axis(1), &columns);
                let matrix = to_dense(ClassifierTag::RF, sample.view())?;
                let parameters = DecisionTreeClassifierParameters {
                    seed: Some(seed),
                    ..tree_params.clone()
                };
                let model = Tree::fit(&matrix, &labels, parameters)
                    .map_err(|e| BenchError::fit(ClassifierTag::RF, e))?;
                Ok(Member::Tree { model, columns })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            members,
            classes,
            n_features,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.members.len()
    }
}

impl TrainedModel for RandomForest {
    fn tag(&self) -> ClassifierTag {
        ClassifierTag::RF
    }

    fn n_classes(&self) -> usize {
        self.classes.n_classes()
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<usize>> {
        Ok(labels_from_proba(&self.predict_proba(x)?))
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.classes.n_classes()));
        for member in &self.members {
            for (row, class) in member.votes(x)?.into_iter().enumerate() {
                proba[(row, class)] += 1.0;
            }
        }
        let n = self.members.len().max(1) as f64;
        proba.mapv_inplace(|votes| votes / n);
        Ok(proba)
    }

    /// Mean impurity decrease, each tree normalized before averaging
    fn feature_importances(&self) -> Option<Array1<f64>> {
        let mut total = Array1::<f64>::zeros(self.n_features);
        for member in &self.members {
            if let Member::Tree { model, columns } = member {
                let raw = model.compute_feature_importances(false);
                let sum: f64 = raw.iter().sum();
                if sum > 0.0 {
                    for (&column, value) in columns.iter().zip(raw) {
                        total[column] += value / sum;
                    }
                }
            }
        }
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy() -> (Array2<f64>, Array1<usize>) {
        let x = array![
            [0.9, 0.1, 0.0],
            [0.8, 0.1, 0.1],
            [0.85, 0.05, 0.1],
            [0.1, 0.9, 0.0],
            [0.05, 0.85, 0.1],
            [0.1, 0.8, 0.1],
            [0.0, 0.1, 0.9],
            [0.1, 0.05, 0.85],
            [0.05, 0.1, 0.85],
        ];
        let y = array![0usize, 0, 0, 1, 1, 1, 2, 2, 2];
        (x, y)
    }

    #[test]
    fn test_forest_probabilities_are_distributions() {
        let (x, y) = toy();
        let params = RandomForestParams {
            n_estimators: 25,
            max_features: Some(3),
            ..Default::default()
        };
        let forest = RandomForest::fit(x.view(), &y, 4, &params).unwrap();
        let proba = forest.predict_proba(x.view()).unwrap();

        assert_eq!(proba.dim(), (9, 4));
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        // class 3 never appears in training
        assert!(proba.column(3).iter().all(|&p| p == 0.0));
        assert_eq!(forest.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_forest_is_deterministic_for_a_seed() {
        let (x, y) = toy();
        let params = RandomForestParams {
            n_estimators: 10,
            seed: 7,
            ..Default::default()
        };
        let a = RandomForest::fit(x.view(), &y, 3, &params).unwrap();
        let b = RandomForest::fit(x.view(), &y, 3, &params).unwrap();
        assert_eq!(
            a.predict_proba(x.view()).unwrap(),
            b.predict_proba(x.view()).unwrap()
        );
    }

    #[test]
    fn test_single_full_tree_votes_with_certainty() {
        let (x, y) = toy();
        let params = RandomForestParams {
            n_estimators: 1,
            max_features: Some(3),
            bootstrap: false,
            ..Default::default()
        };
        let forest = RandomForest::fit(x.view(), &y, 3, &params).unwrap();

        // one full-width tree on pure clusters votes with certainty
        let proba = forest.predict_proba(x.view()).unwrap();
        for (row, &label) in y.iter().enumerate() {
            assert_eq!(proba[(row, label)], 1.0);
        }
        let importances = forest.feature_importances().unwrap();
        assert!((importances.sum() - 1.0).abs() < 1e-9);
        assert_eq!(importances.len(), 3);
    }

    #[test]
    fn test_forest_rejects_single_class() {
        let x = array![[0.1, 0.2], [0.3, 0.4]];
        let y = array![1usize, 1];
        assert!(RandomForest::fit(x.view(), &y, 2, &RandomForestParams::default()).is_err());
    }
}

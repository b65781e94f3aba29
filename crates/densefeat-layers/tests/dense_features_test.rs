use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use densefeat_core::value::{DType, DenseValue, FeatureValue, Features, SparseValue};
use densefeat_layers::cache::TransformationCache;
use densefeat_layers::column::{
    bucketized_column, categorical_column_with_hash_bucket, categorical_column_with_identity,
    categorical_column_with_vocabulary_list, embedding_column, indicator_column, numeric_column,
    ColumnRef, Combiner, DenseColumn, EmbeddingColumn, FeatureColumn, IndicatorColumn,
};
use densefeat_layers::dense_features::{ColumnTensors, DenseFeatures, DenseFeaturesConfig};
use densefeat_layers::error::{LayerError, LayerResult};
use densefeat_layers::initializer::Initializer;
use densefeat_layers::layer::{Layer, LayerOptions};
use densefeat_layers::state::StateManager;
use densefeat_layers::tensor::Tensor;

/// Dense column that records how often it is resolved.
#[derive(Debug, Default)]
struct CountingColumn {
    resolved: AtomicUsize,
}

impl FeatureColumn for CountingColumn {
    fn name(&self) -> &str {
        "counting"
    }

    fn transform_feature(
        &self,
        _cache: &mut TransformationCache<'_>,
        _state: &StateManager,
    ) -> LayerResult<FeatureValue> {
        self.resolved.fetch_add(1, Ordering::SeqCst);
        Ok(DenseValue::float32(&[1, 1], vec![0.0])?.into())
    }

    fn as_dense(&self) -> Option<&dyn DenseColumn> {
        Some(self)
    }
}

impl DenseColumn for CountingColumn {
    fn variable_shape(&self) -> Vec<usize> {
        vec![1]
    }

    fn get_dense_tensor(
        &self,
        cache: &mut TransformationCache<'_>,
        state: &StateManager,
    ) -> LayerResult<Tensor> {
        cache.get(self, state)?;
        Ok(Tensor::zeros(&[1, 1]))
    }
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-6, "{:?} != {:?}", actual, expected);
    }
}

#[test]
fn test_non_mapping_input_is_rejected_before_any_column() {
    let counting = Arc::new(CountingColumn::default());
    let layer = DenseFeatures::new(vec![counting.clone() as ColumnRef]).unwrap();

    let tensor = Tensor::ones(&[2, 1]);
    let raw = DenseValue::float32(&[2], vec![1.0, 2.0]).unwrap();
    let feature = FeatureValue::from(raw.clone());

    for err in [
        layer.call(&tensor, None).unwrap_err(),
        layer.call(&raw, None).unwrap_err(),
        layer.call(&feature, None).unwrap_err(),
    ] {
        assert!(matches!(err, LayerError::InvalidInput { .. }));
        assert!(err
            .to_string()
            .starts_with("Expected a feature mapping here, instead got:"));
    }
    assert_eq!(counting.resolved.load(Ordering::SeqCst), 0);

    layer.call(&Features::new(), None).unwrap();
    assert_eq!(counting.resolved.load(Ordering::SeqCst), 1);
}

#[test]
fn test_single_numeric_column_widens_to_f32() {
    let layer = DenseFeatures::new(vec![Arc::new(numeric_column("price"))]).unwrap();
    let features = Features::new().with(
        "price",
        DenseValue::float64(&[4], vec![1.25, -2.5, 0.0, 1e6]).unwrap(),
    );

    let out = layer.call(&features, None).unwrap();
    assert_eq!(out.shape(), &[4, 1]);
    assert_eq!(out.data(), &[1.25, -2.5, 0.0, 1e6]);

    let features =
        Features::new().with("price", DenseValue::int64(&[2, 1], vec![3, 7]).unwrap());
    let out = layer.call(&features, None).unwrap();
    assert_eq!(out.data(), &[3.0, 7.0]);
}

#[test]
fn test_columns_concatenate_in_layer_order() {
    let features = Features::new()
        .with("a", DenseValue::float32(&[2], vec![1.0, 2.0]).unwrap())
        .with(
            "b",
            DenseValue::float32(&[2, 3], vec![10.0, 11.0, 12.0, 20.0, 21.0, 22.0]).unwrap(),
        );
    let a: ColumnRef = Arc::new(numeric_column("a"));
    let b: ColumnRef = Arc::new(numeric_column("b").with_shape(&[3]).unwrap());

    let ab = DenseFeatures::new(vec![a.clone(), b.clone()]).unwrap();
    let out = ab.call(&features, None).unwrap();
    assert_eq!(out.shape(), &[2, 4]);
    assert_eq!(
        out.data(),
        &[1.0, 10.0, 11.0, 12.0, 2.0, 20.0, 21.0, 22.0]
    );

    let ba = DenseFeatures::new(vec![b, a]).unwrap();
    let out = ba.call(&features, None).unwrap();
    assert_eq!(out.row(0), &[10.0, 11.0, 12.0, 1.0]);
}

#[test]
fn test_output_tensors_are_collected_per_column() {
    let features = Features::new()
        .with("a", DenseValue::float32(&[2], vec![1.0, 2.0]).unwrap())
        .with(
            "m",
            DenseValue::float32(&[2, 2, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).unwrap(),
        );
    let layer = DenseFeatures::new(vec![
        Arc::new(numeric_column("a")),
        Arc::new(numeric_column("m").with_shape(&[2, 2]).unwrap()),
    ])
    .unwrap();

    let mut outputs = ColumnTensors::new();
    let out = layer.call(&features, Some(&mut outputs)).unwrap();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs["a"], Tensor::from_data(&[2, 1], vec![1.0, 2.0]));
    assert_eq!(
        outputs["m"],
        Tensor::from_data(&[2, 4], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
    );
    assert_eq!(
        Tensor::concat(&[outputs["a"].clone(), outputs["m"].clone()]).unwrap(),
        out
    );
}

#[test]
fn test_repeated_calls_are_identical() {
    let kw = categorical_column_with_hash_bucket("kw", 16, DType::String).unwrap();
    let layer = DenseFeatures::new(vec![
        Arc::new(numeric_column("x")),
        Arc::new(embedding_column(kw, 4).unwrap()),
    ])
    .unwrap();
    let features = Features::new()
        .with("x", DenseValue::float32(&[2], vec![0.5, 1.5]).unwrap())
        .with(
            "kw",
            SparseValue::from_string_rows(&[vec!["a", "b"], vec!["c"]]),
        );

    let first = layer.call(&features, None).unwrap();
    let second = layer.call(&features, None).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.shape(), &[2, 5]);
}

#[test]
fn test_categorical_column_rejected_at_construction() {
    let ids: ColumnRef = Arc::new(categorical_column_with_identity("id", 5, None).unwrap());
    let err = DenseFeatures::new(vec![Arc::new(numeric_column("x")), ids]).unwrap_err();
    match err {
        LayerError::InvalidColumn {
            column,
            column_type,
            expected,
        } => {
            assert_eq!(column, "id");
            assert!(column_type.contains("IdentityCategoricalColumn"));
            assert_eq!(expected, "DenseColumn");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_construction_validation() {
    assert!(matches!(
        DenseFeatures::new(vec![]),
        Err(LayerError::ConfigError { .. })
    ));

    let err = DenseFeatures::new(vec![
        Arc::new(numeric_column("x")),
        Arc::new(numeric_column("x").with_shape(&[2]).unwrap()),
    ])
    .unwrap_err();
    assert!(err.to_string().contains("Duplicate feature column name"));

    let options = LayerOptions::default().with_kwarg("dtype", "float64");
    assert!(DenseFeatures::with_options(vec![Arc::new(numeric_column("x"))], options).is_err());

    let options = LayerOptions::default().with_kwarg("activation", "relu");
    assert!(DenseFeatures::with_options(vec![Arc::new(numeric_column("x"))], options).is_err());

    let options = LayerOptions::default()
        .with_name("inputs")
        .with_kwarg("dtype", "float32")
        .with_kwarg("batch_size", 32);
    let layer = DenseFeatures::with_options(vec![Arc::new(numeric_column("x"))], options).unwrap();
    assert_eq!(layer.name(), "inputs");
}

#[test]
fn test_missing_feature_propagates() {
    let layer = DenseFeatures::new(vec![Arc::new(numeric_column("x"))]).unwrap();
    let features = Features::new().with("y", DenseValue::float32(&[1], vec![1.0]).unwrap());
    let err = layer.call(&features, None).unwrap_err();
    assert_eq!(err.to_string(), "Feature x is not in features dictionary");
}

#[test]
fn test_batch_size_mismatch() {
    let layer = DenseFeatures::new(vec![
        Arc::new(numeric_column("a")),
        Arc::new(numeric_column("b")),
    ])
    .unwrap();
    let features = Features::new()
        .with("a", DenseValue::float32(&[2], vec![1.0, 2.0]).unwrap())
        .with("b", DenseValue::float32(&[3], vec![1.0, 2.0, 3.0]).unwrap());
    let err = layer.call(&features, None).unwrap_err();
    assert!(matches!(err, LayerError::BatchSizeMismatch { .. }));
    assert!(err.to_string().contains("(a, b): (2, 3)"));
}

#[test]
fn test_embedding_with_assigned_weights() {
    let ids = categorical_column_with_identity("item", 3, None).unwrap();
    let emb = embedding_column(ids, 2)
        .unwrap()
        .with_combiner(Combiner::Sum);
    let emb_name = emb.name().to_string();
    let mut layer = DenseFeatures::with_options(
        vec![Arc::new(emb)],
        LayerOptions::default().with_name("emb_layer"),
    )
    .unwrap();

    let weights = layer.trainable_weights();
    assert_eq!(weights.len(), 1);
    assert_eq!(weights[0].name(), "emb_layer/item_embedding/embedding_weights");
    assert_eq!(weights[0].value().shape(), &[3, 2]);

    layer
        .state_mut()
        .assign(
            &emb_name,
            "embedding_weights",
            Tensor::from_data(&[3, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        )
        .unwrap();

    let features = Features::new().with(
        "item",
        SparseValue::from_int64_rows(&[vec![0i64, 2], vec![], vec![1]]),
    );
    let out = layer.call(&features, None).unwrap();
    assert_eq!(out.shape(), &[3, 2]);
    assert_close(out.data(), &[6.0, 8.0, 0.0, 0.0, 3.0, 4.0]);

    layer.set_trainable(false);
    assert!(layer.trainable_weights().is_empty());
    assert_eq!(layer.non_trainable_weights().len(), 1);
}

#[test]
fn test_shared_categorical_source() {
    let colors = Arc::new(
        categorical_column_with_vocabulary_list("color", vec!["R", "G", "B"]).unwrap(),
    );
    let emb = EmbeddingColumn::new(colors.clone(), 2)
        .unwrap()
        .with_initializer(Initializer::Ones)
        .with_combiner(Combiner::Mean);
    let ind = IndicatorColumn::new(colors);
    let layer = DenseFeatures::new(vec![Arc::new(ind), Arc::new(emb)]).unwrap();
    assert_eq!(layer.output_dim(), 5);

    let features = Features::new().with(
        "color",
        SparseValue::from_string_rows(&[vec!["B", "B"], vec!["X"]]),
    );
    let out = layer.call(&features, None).unwrap();
    assert_eq!(out.row(0), &[0.0, 0.0, 2.0, 1.0, 1.0]);
    // Unknown values map to -1, which both wrappers skip.
    assert_eq!(out.row(1), &[0.0, 0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn test_bucketized_and_indicator_columns() {
    let age = bucketized_column(numeric_column("age"), vec![18.0, 65.0]).unwrap();
    let ids = categorical_column_with_identity("slot", 3, Some(0)).unwrap();
    let layer = DenseFeatures::new(vec![
        Arc::new(age),
        Arc::new(indicator_column(ids)),
    ])
    .unwrap();

    let features = Features::new()
        .with("age", DenseValue::float32(&[2], vec![30.0, 70.0]).unwrap())
        .with("slot", DenseValue::int64(&[2, 2], vec![2, -1, 9, 1]).unwrap());
    let out = layer.call(&features, None).unwrap();
    assert_eq!(out.shape(), &[2, 6]);
    assert_eq!(out.row(0), &[0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    assert_eq!(out.row(1), &[0.0, 0.0, 1.0, 1.0, 1.0, 0.0]);
}

#[test]
fn test_config_round_trip() {
    let vocab = categorical_column_with_vocabulary_list("color", vec!["R", "G"])
        .unwrap()
        .with_num_oov_buckets(1)
        .unwrap();
    let layer = DenseFeatures::with_options(
        vec![
            Arc::new(numeric_column("price")),
            Arc::new(
                embedding_column(vocab.clone(), 3)
                    .unwrap()
                    .with_initializer(Initializer::Constant(0.5)),
            ),
            Arc::new(indicator_column(vocab)),
        ],
        LayerOptions::default().with_name("roundtrip").with_trainable(false),
    )
    .unwrap();

    let config = layer.get_config().unwrap();
    let json = serde_json::to_string(&config).unwrap();
    let parsed: DenseFeaturesConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);

    let rebuilt = DenseFeatures::from_config(parsed).unwrap();
    assert_eq!(rebuilt.name(), "roundtrip");
    assert!(!rebuilt.trainable());
    assert_eq!(rebuilt.output_dim(), layer.output_dim());

    let features = Features::new()
        .with("price", DenseValue::float32(&[1], vec![2.0]).unwrap())
        .with("color", SparseValue::from_string_rows(&[vec!["G"]]));
    assert_eq!(
        rebuilt.call(&features, None).unwrap(),
        layer.call(&features, None).unwrap()
    );
}

#[test]
fn test_is_feature_layer() {
    let layer = DenseFeatures::new(vec![Arc::new(numeric_column("x"))]).unwrap();
    assert!(layer.is_feature_layer());
    assert_eq!(layer.compute_output_shape(Some(8)), (Some(8), 1));
}

//! ONNX test fixtures
//!
//! Builds small but real ONNX graphs with tract's protobuf types and
//! writes them to disk, so the backends are exercised end to end without
//! checked-in binaries.
//!
//! - `disease_classifier`: GlobalAveragePool → Flatten → MatMul, one logit
//!   per class; each colour channel votes for one class
//! - `crop_classifier`: MatMul → ArgMax, int64 class id like a classifier
//!   exported without ZipMap
//! - `yield_regressor`: one `[1, 1]` input per column (`Crop` text via
//!   CategoryMapper, `Crop_Year` int64, `Area` float) → Concat → linear
//! - `tree_yield_regressor`: OneHotEncoder + TreeEnsembleRegressor, the
//!   usual scikit-learn export, which tract cannot execute

#![allow(dead_code)]

use prost::Message;
use std::path::Path;
use tract_onnx::pb::{
    attribute_proto::AttributeType,
    tensor_proto::DataType,
    tensor_shape_proto::{dimension, Dimension},
    type_proto, AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto,
    TensorProto, TensorShapeProto, TypeProto, ValueInfoProto,
};

const ML_DOMAIN: &str = "ai.onnx.ml";

/// Crops known to the yield fixture, mapped to 0, 1, 2
pub const YIELD_CROPS: [&str; 3] = ["Rice", "Wheat", "Maize"];
/// Yield fixture weights for (crop id, crop year, area in ha)
pub const YIELD_WEIGHTS: [f32; 3] = [0.5, 0.001, 0.25];
pub const YIELD_BIAS: f32 = 0.1;

// =============================================================================
// Protobuf helpers
// =============================================================================

fn value_info(name: &str, elem_type: DataType, dims: &[i64]) -> ValueInfoProto {
    let dim = dims
        .iter()
        .map(|d| Dimension {
            value: Some(dimension::Value::DimValue(*d)),
            ..Default::default()
        })
        .collect();

    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: elem_type as i32,
                shape: Some(TensorShapeProto { dim }),
            })),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn float_tensor(name: &str, dims: &[i64], values: Vec<f32>) -> TensorProto {
    TensorProto {
        name: name.to_string(),
        dims: dims.to_vec(),
        data_type: DataType::Float as i32,
        float_data: values,
        ..Default::default()
    }
}

fn int_attr(name: &str, value: i64) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Int as i32,
        i: value,
        ..Default::default()
    }
}

fn ints_attr(name: &str, values: &[i64]) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Ints as i32,
        ints: values.to_vec(),
        ..Default::default()
    }
}

fn strings_attr(name: &str, values: &[&str]) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Strings as i32,
        strings: values.iter().map(|v| v.as_bytes().to_vec()).collect(),
        ..Default::default()
    }
}

fn node(op_type: &str, inputs: &[&str], outputs: &[&str], attribute: Vec<AttributeProto>) -> NodeProto {
    NodeProto {
        name: outputs[0].to_string(),
        op_type: op_type.to_string(),
        input: inputs.iter().map(|s| s.to_string()).collect(),
        output: outputs.iter().map(|s| s.to_string()).collect(),
        attribute,
        ..Default::default()
    }
}

fn ml_node(op_type: &str, inputs: &[&str], outputs: &[&str], attribute: Vec<AttributeProto>) -> NodeProto {
    NodeProto {
        domain: ML_DOMAIN.to_string(),
        ..node(op_type, inputs, outputs, attribute)
    }
}

fn model(graph: GraphProto) -> ModelProto {
    ModelProto {
        ir_version: 8,
        opset_import: vec![
            OperatorSetIdProto {
                domain: String::new(),
                version: 13,
            },
            OperatorSetIdProto {
                domain: ML_DOMAIN.to_string(),
                version: 3,
            },
        ],
        producer_name: "agri-gateway-tests".to_string(),
        graph: Some(graph),
        ..Default::default()
    }
}

/// Encode and write a model file
pub fn write_model(path: &Path, model: &ModelProto) {
    std::fs::write(path, model.encode_to_vec()).expect("Failed to write ONNX fixture");
}

// =============================================================================
// Models
// =============================================================================

/// Image classifier over `[1, 3, height, width]`
///
/// Logits are the per-channel means routed to `votes[channel]`, so an
/// image dominated by one channel predicts that channel's class.
pub fn disease_classifier(height: i64, width: i64, classes: usize, votes: [usize; 3]) -> ModelProto {
    let mut weights = vec![0.0f32; 3 * classes];
    for (channel, class) in votes.iter().enumerate() {
        weights[channel * classes + class] = 1.0;
    }

    model(GraphProto {
        name: "disease".to_string(),
        node: vec![
            node("GlobalAveragePool", &["image"], &["pooled"], vec![]),
            node("Flatten", &["pooled"], &["flat"], vec![int_attr("axis", 1)]),
            node("MatMul", &["flat", "votes"], &["logits"], vec![]),
        ],
        initializer: vec![float_tensor("votes", &[3, classes as i64], weights)],
        input: vec![value_info("image", DataType::Float, &[1, 3, height, width])],
        output: vec![value_info("logits", DataType::Float, &[1, classes as i64])],
        ..Default::default()
    })
}

/// Tabular classifier: class id = argmax of `features · weights`
pub fn crop_classifier(weights: &[Vec<f32>]) -> ModelProto {
    let features = weights.len() as i64;
    let classes = weights.first().map(|row| row.len()).unwrap_or(0) as i64;
    let flat: Vec<f32> = weights.iter().flatten().copied().collect();

    model(GraphProto {
        name: "crop".to_string(),
        node: vec![
            node("MatMul", &["features", "weights"], &["scores"], vec![]),
            node(
                "ArgMax",
                &["scores"],
                &["label"],
                vec![int_attr("axis", 1), int_attr("keepdims", 0)],
            ),
        ],
        initializer: vec![float_tensor("weights", &[features, classes], flat)],
        input: vec![value_info("features", DataType::Float, &[1, features])],
        output: vec![value_info("label", DataType::Int64, &[1])],
        ..Default::default()
    })
}

/// Linear regressor over named record columns
pub fn yield_regressor() -> ModelProto {
    let crop_ids: Vec<i64> = (0..YIELD_CROPS.len() as i64).collect();

    model(GraphProto {
        name: "yield".to_string(),
        node: vec![
            ml_node(
                "CategoryMapper",
                &["Crop"],
                &["crop_id"],
                vec![
                    strings_attr("cats_strings", &YIELD_CROPS),
                    ints_attr("cats_int64s", &crop_ids),
                    int_attr("default_int64", -1),
                ],
            ),
            node("Cast", &["crop_id"], &["crop_f"], vec![int_attr("to", DataType::Float as i64)]),
            node("Cast", &["Crop_Year"], &["year_f"], vec![int_attr("to", DataType::Float as i64)]),
            node("Concat", &["crop_f", "year_f", "Area"], &["row"], vec![int_attr("axis", 1)]),
            node("MatMul", &["row", "coef"], &["scaled"], vec![]),
            node("Add", &["scaled", "intercept"], &["yield_t_ha"], vec![]),
        ],
        initializer: vec![
            float_tensor("coef", &[3, 1], YIELD_WEIGHTS.to_vec()),
            float_tensor("intercept", &[1], vec![YIELD_BIAS]),
        ],
        input: vec![
            value_info("Crop", DataType::String, &[1, 1]),
            value_info("Crop_Year", DataType::Int64, &[1, 1]),
            value_info("Area", DataType::Float, &[1, 1]),
        ],
        output: vec![value_info("yield_t_ha", DataType::Float, &[1, 1])],
        ..Default::default()
    })
}

/// Expected output of [`yield_regressor`]
pub fn expected_yield(crop: &str, crop_year: i64, area_ha: f64) -> f64 {
    let crop_id = YIELD_CROPS
        .iter()
        .position(|c| *c == crop)
        .map(|ix| ix as f64)
        .unwrap_or(-1.0);
    crop_id * YIELD_WEIGHTS[0] as f64
        + crop_year as f64 * YIELD_WEIGHTS[1] as f64
        + area_ha * YIELD_WEIGHTS[2] as f64
        + YIELD_BIAS as f64
}

/// Tree-ensemble pipeline as exported by skl2onnx
pub fn tree_yield_regressor() -> ModelProto {
    model(GraphProto {
        name: "yield_tree".to_string(),
        node: vec![
            ml_node(
                "OneHotEncoder",
                &["Crop"],
                &["crop_onehot"],
                vec![strings_attr("cats_strings", &YIELD_CROPS)],
            ),
            node("Concat", &["crop_onehot", "Area"], &["row"], vec![int_attr("axis", 1)]),
            ml_node(
                "TreeEnsembleRegressor",
                &["row"],
                &["variable"],
                vec![int_attr("n_targets", 1)],
            ),
        ],
        input: vec![
            value_info("Crop", DataType::String, &[1, 1]),
            value_info("Area", DataType::Float, &[1, 1]),
        ],
        output: vec![value_info("variable", DataType::Float, &[1, 1])],
        ..Default::default()
    })
}

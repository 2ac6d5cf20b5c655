use serde::{Deserialize, Serialize};

use crate::ops::TensorOps;
use ndarray::ArrayD;

const NONE_TAG: u32 = 0;
const RELU_TAG: u32 = 1;
const LOG_SOFTMAX_TAG: u32 = 2;

/// An activation fused at the end of a weighted layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFn {
    Relu,
    LogSoftmax,
}
use ActFn::*;

impl ActFn {
    pub fn apply<O: TensorOps + ?Sized>(self, ops: &O, x: ArrayD<f32>) -> ArrayD<f32> {
        match self {
            Relu => ops.relu(x),
            LogSoftmax => ops.log_softmax(x),
        }
    }

    /// The wire tag of an optional activation, `0` meaning none.
    pub fn tag(act_fn: Option<Self>) -> u32 {
        match act_fn {
            None => NONE_TAG,
            Some(Relu) => RELU_TAG,
            Some(LogSoftmax) => LOG_SOFTMAX_TAG,
        }
    }

    /// The inverse of `ActFn::tag`, `None` for unknown tags.
    pub fn from_tag(tag: u32) -> Option<Option<Self>> {
        match tag {
            NONE_TAG => Some(None),
            RELU_TAG => Some(Some(Relu)),
            LOG_SOFTMAX_TAG => Some(Some(LogSoftmax)),
            _ => None,
        }
    }
}

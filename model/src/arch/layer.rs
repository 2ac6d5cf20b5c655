use ndarray::{ArrayD, ArrayView, ArrayViewD, Dimension, Ix1, Ix2, Ix3, Ix4};
use serde::{Deserialize, Serialize};

use super::{ActFn, ParameterTensor, TensorShape};
use crate::{MlErr, Result, ops::TensorOps};

const CONV2D_TAG: u32 = 0;
const MAX_POOL2D_TAG: u32 = 1;
const FLATTEN_TAG: u32 = 2;
const LINEAR_TAG: u32 = 3;
const RELU_TAG: u32 = 4;
const LOG_SOFTMAX_TAG: u32 = 5;

fn one() -> usize {
    1
}

/// The declarative description of one computation step and its shape contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Conv2d {
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        #[serde(default = "one")]
        stride: usize,
        #[serde(default)]
        padding: usize,
        #[serde(default)]
        act_fn: Option<ActFn>,
    },
    MaxPool2d {
        kernel_size: usize,
        stride: usize,
    },
    Flatten,
    Linear {
        in_features: usize,
        out_features: usize,
        #[serde(default)]
        act_fn: Option<ActFn>,
    },
    Relu,
    LogSoftmax,
}
use LayerSpec::*;

impl LayerSpec {
    pub fn conv2d(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Self {
        Conv2d {
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
            act_fn: None,
        }
    }

    pub fn max_pool2d(kernel_size: usize, stride: usize) -> Self {
        MaxPool2d {
            kernel_size,
            stride,
        }
    }

    pub fn linear(in_features: usize, out_features: usize) -> Self {
        Linear {
            in_features,
            out_features,
            act_fn: None,
        }
    }

    /// Fuses `act` at the end of a weighted layer, other layers are returned untouched.
    pub fn with_act(mut self, act: ActFn) -> Self {
        if let Conv2d { act_fn, .. } | Linear { act_fn, .. } = &mut self {
            *act_fn = Some(act);
        }

        self
    }

    pub fn act_fn(&self) -> Option<ActFn> {
        match *self {
            Conv2d { act_fn, .. } | Linear { act_fn, .. } => act_fn,
            _ => None,
        }
    }

    /// The prefix used to name nodes of this kind.
    pub fn name_prefix(&self) -> &'static str {
        match self {
            Conv2d { .. } => "conv",
            MaxPool2d { .. } => "max_pool",
            Flatten => "flatten",
            Linear { .. } => "linear",
            Relu => "relu",
            LogSoftmax => "log_softmax",
        }
    }

    pub fn kind_tag(&self) -> u32 {
        match self {
            Conv2d { .. } => CONV2D_TAG,
            MaxPool2d { .. } => MAX_POOL2D_TAG,
            Flatten => FLATTEN_TAG,
            Linear { .. } => LINEAR_TAG,
            Relu => RELU_TAG,
            LogSoftmax => LOG_SOFTMAX_TAG,
        }
    }

    /// The shape transforming parameters in their wire order.
    pub fn attrs(&self) -> Vec<usize> {
        match *self {
            Conv2d {
                in_channels,
                out_channels,
                kernel_size,
                stride,
                padding,
                ..
            } => vec![in_channels, out_channels, kernel_size, stride, padding],
            MaxPool2d {
                kernel_size,
                stride,
            } => vec![kernel_size, stride],
            Linear {
                in_features,
                out_features,
                ..
            } => vec![in_features, out_features],
            Flatten | Relu | LogSoftmax => vec![],
        }
    }

    /// Rebuilds a layer from its wire tag, activation and attributes.
    ///
    /// # Returns
    /// `None` if the tag is unknown, the attribute count is wrong or an
    /// activation is attached to a layer that can't carry one.
    pub fn from_wire(kind: u32, act_fn: Option<ActFn>, attrs: &[usize]) -> Option<Self> {
        let layer = match (kind, attrs) {
            (CONV2D_TAG, &[in_channels, out_channels, kernel_size, stride, padding]) => Conv2d {
                in_channels,
                out_channels,
                kernel_size,
                stride,
                padding,
                act_fn,
            },
            (LINEAR_TAG, &[in_features, out_features]) => Linear {
                in_features,
                out_features,
                act_fn,
            },
            (MAX_POOL2D_TAG, &[kernel_size, stride]) if act_fn.is_none() => MaxPool2d {
                kernel_size,
                stride,
            },
            (FLATTEN_TAG, []) if act_fn.is_none() => Flatten,
            (RELU_TAG, []) if act_fn.is_none() => Relu,
            (LOG_SOFTMAX_TAG, []) if act_fn.is_none() => LogSoftmax,
            _ => return None,
        };

        Some(layer)
    }

    /// Checks the layer's own parameters, regardless of its input.
    pub fn validate(&self, layer: usize) -> Result<()> {
        let invalid = |reason| Err(MlErr::InvalidLayer { layer, reason });

        match *self {
            Conv2d {
                in_channels,
                out_channels,
                kernel_size,
                stride,
                ..
            } => {
                if in_channels == 0 || out_channels == 0 {
                    return invalid("conv2d channel counts must be positive");
                }
                if kernel_size == 0 || stride == 0 {
                    return invalid("conv2d kernel_size and stride must be positive");
                }
            }
            MaxPool2d {
                kernel_size,
                stride,
            } => {
                if kernel_size == 0 || stride == 0 {
                    return invalid("max_pool2d kernel_size and stride must be positive");
                }
            }
            Linear {
                in_features,
                out_features,
                ..
            } => {
                if in_features == 0 || out_features == 0 {
                    return invalid("linear feature counts must be positive");
                }
            }
            Flatten | Relu | LogSoftmax => {}
        }

        Ok(())
    }

    /// Computes the output shape in closed form.
    ///
    /// # Arguments
    /// * `layer` - The index of this layer, used in errors.
    /// * `input` - The shape this layer would consume.
    ///
    /// # Returns
    /// The produced shape or a `ShapeMismatch` if `input` doesn't fit the layer.
    pub fn output_shape(&self, layer: usize, input: &TensorShape) -> Result<TensorShape> {
        let mismatch = |what, got, expected| MlErr::ShapeMismatch {
            layer,
            what,
            got,
            expected,
        };

        let shape = match *self {
            Conv2d {
                in_channels,
                out_channels,
                kernel_size,
                stride,
                padding,
                ..
            } => {
                let [c, h, w] = fixed_rank::<3>(layer, input)?;

                if c != in_channels {
                    return Err(mismatch("in_channels", c, in_channels));
                }

                let padded = |d: usize| padding.checked_mul(2).and_then(|p| d.checked_add(p));
                let (Some(ph), Some(pw)) = (padded(h), padded(w)) else {
                    return Err(MlErr::InvalidLayer {
                        layer,
                        reason: "conv2d padding overflows the input size",
                    });
                };
                if ph < kernel_size {
                    return Err(mismatch("padded height", ph, kernel_size));
                }
                if pw < kernel_size {
                    return Err(mismatch("padded width", pw, kernel_size));
                }

                let oh = (ph - kernel_size) / stride + 1;
                let ow = (pw - kernel_size) / stride + 1;
                TensorShape::from([out_channels, oh, ow])
            }
            MaxPool2d {
                kernel_size,
                stride,
            } => {
                let [c, h, w] = fixed_rank::<3>(layer, input)?;

                if h < kernel_size {
                    return Err(mismatch("height", h, kernel_size));
                }
                if w < kernel_size {
                    return Err(mismatch("width", w, kernel_size));
                }

                TensorShape::from([c, (h - kernel_size) / stride + 1, (w - kernel_size) / stride + 1])
            }
            Flatten => match input.checked_numel() {
                Some(n) => TensorShape::from([n]),
                None => {
                    return Err(MlErr::InvalidLayer {
                        layer,
                        reason: "the flattened input is too large",
                    });
                }
            },
            Linear {
                in_features,
                out_features,
                ..
            } => {
                let [n] = fixed_rank::<1>(layer, input)?;

                if n != in_features {
                    return Err(mismatch("in_features", n, in_features));
                }

                TensorShape::from([out_features])
            }
            Relu | LogSoftmax => input.clone(),
        };

        Ok(shape)
    }

    /// The learnable tensors of this layer, `weight` first.
    pub fn param_shapes(&self) -> Vec<(&'static str, TensorShape)> {
        match *self {
            Conv2d {
                in_channels,
                out_channels,
                kernel_size,
                ..
            } => vec![
                (
                    "weight",
                    TensorShape::from([out_channels, in_channels, kernel_size, kernel_size]),
                ),
                ("bias", TensorShape::from([out_channels])),
            ],
            Linear {
                in_features,
                out_features,
                ..
            } => vec![
                ("weight", TensorShape::from([out_features, in_features])),
                ("bias", TensorShape::from([out_features])),
            ],
            MaxPool2d { .. } | Flatten | Relu | LogSoftmax => vec![],
        }
    }

    /// The amount of inputs feeding each output unit, `0` for layers without parameters.
    ///
    /// Saturates at `usize::MAX`, such a layer never gets its parameters built.
    pub fn fan_in(&self) -> usize {
        match *self {
            Conv2d {
                in_channels,
                kernel_size,
                ..
            } => in_channels
                .saturating_mul(kernel_size)
                .saturating_mul(kernel_size),
            Linear { in_features, .. } => in_features,
            MaxPool2d { .. } | Flatten | Relu | LogSoftmax => 0,
        }
    }

    /// Runs this layer on a single sample through `ops`.
    ///
    /// # Arguments
    /// * `layer` - The index of this layer, used in errors.
    /// * `ops` - The tensor math implementation.
    /// * `params` - This layer's tensors, in `param_shapes` order.
    /// * `x` - The input sample.
    ///
    /// # Returns
    /// The layer output, fused activation included.
    pub fn forward<O: TensorOps + ?Sized>(
        &self,
        layer: usize,
        ops: &O,
        params: &[&ParameterTensor],
        x: ArrayD<f32>,
    ) -> Result<ArrayD<f32>> {
        let y = match *self {
            Conv2d {
                stride, padding, ..
            } => {
                let (weight, bias) = weight_bias(layer, params)?;
                let x = as_dim::<Ix3>(layer, x.view(), "conv2d input rank")?;
                let weight = as_dim::<Ix4>(layer, weight, "conv2d weight rank")?;
                let bias = as_dim::<Ix1>(layer, bias, "conv2d bias rank")?;
                ops.conv2d(x, weight, bias, stride, padding).into_dyn()
            }
            MaxPool2d {
                kernel_size,
                stride,
            } => {
                let x = as_dim::<Ix3>(layer, x.view(), "max_pool2d input rank")?;
                ops.max_pool2d(x, kernel_size, stride).into_dyn()
            }
            Flatten => ops.flatten(x.view()).into_dyn(),
            Linear { .. } => {
                let (weight, bias) = weight_bias(layer, params)?;
                let x = as_dim::<Ix1>(layer, x.view(), "linear input rank")?;
                let weight = as_dim::<Ix2>(layer, weight, "linear weight rank")?;
                let bias = as_dim::<Ix1>(layer, bias, "linear bias rank")?;
                ops.linear(x, weight, bias).into_dyn()
            }
            Relu => ops.relu(x),
            LogSoftmax => ops.log_softmax(x),
        };

        Ok(match self.act_fn() {
            Some(act_fn) => act_fn.apply(ops, y),
            None => y,
        })
    }
}

fn fixed_rank<const N: usize>(layer: usize, input: &TensorShape) -> Result<[usize; N]> {
    input
        .dims()
        .try_into()
        .map_err(|_| MlErr::ShapeMismatch {
            layer,
            what: "input rank",
            got: input.rank(),
            expected: N,
        })
}

fn weight_bias<'a>(
    layer: usize,
    params: &[&'a ParameterTensor],
) -> Result<(ArrayViewD<'a, f32>, ArrayViewD<'a, f32>)> {
    match params {
        &[weight, bias] => Ok((weight.view(), bias.view())),
        _ => Err(MlErr::ShapeMismatch {
            layer,
            what: "parameter tensors",
            got: params.len(),
            expected: 2,
        }),
    }
}

fn as_dim<'a, D: Dimension>(
    layer: usize,
    x: ArrayViewD<'a, f32>,
    what: &'static str,
) -> Result<ArrayView<'a, f32, D>> {
    let got = x.ndim();
    x.into_dimensionality::<D>().map_err(|_| MlErr::ShapeMismatch {
        layer,
        what,
        got,
        expected: D::NDIM.unwrap_or_default(),
    })
}

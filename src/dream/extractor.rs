//! Activation losses over the intermediate layers of a network.
use arrayfire::*;
use std::iter::FromIterator;

use crate::errors::Error;
use crate::models::Network;
use crate::tensor::*;

/// Ordered table of layer names and the coefficients their activations are weighted with.
///
/// Names are unique: inserting a name again updates its coefficient and keeps its position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerWeights {
    entries: Vec<(String, PrimitiveType)>,
}

impl LayerWeights {
    pub fn new() -> LayerWeights {
        LayerWeights::default()
    }

    /// Creates a table in which every layer has a coefficient of one.
    pub fn uniform<S: AsRef<str>>(names: &[S]) -> LayerWeights {
        names.iter().map(|name| (name.as_ref().to_string(), 1.)).collect()
    }

    /// Creates a table containing a single layer.
    pub fn single(name: &str, coefficient: PrimitiveType) -> LayerWeights {
        let mut weights = LayerWeights::new();
        weights.insert(name, coefficient);
        weights
    }

    pub fn insert(&mut self, name: &str, coefficient: PrimitiveType) {
        match self.entries.iter_mut().find(|(entry, _)| entry == name) {
            Some(entry) => entry.1 = coefficient,
            None => self.entries.push((name.to_string(), coefficient)),
        }
    }

    pub fn get(&self, name: &str) -> Option<PrimitiveType> {
        self.entries.iter().find(|(entry, _)| entry == name).map(|(_, coefficient)| *coefficient)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn coefficients(&self) -> impl Iterator<Item = PrimitiveType> + '_ {
        self.entries.iter().map(|(_, coefficient)| *coefficient)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, PrimitiveType)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, PrimitiveType)> for LayerWeights {
    fn from_iter<I: IntoIterator<Item = (String, PrimitiveType)>>(iter: I) -> LayerWeights {
        let mut weights = LayerWeights::new();
        for (name, coefficient) in iter {
            weights.insert(&name, coefficient);
        }
        weights
    }
}


/// Differentiable objective of the input of a network.
pub trait Objective {
    /// Returns the value of the objective and its derivative with respect to the input.
    fn loss_and_gradient(&self, network: &mut Network, input: &Tensor) -> Result<(PrimitiveType, Tensor), Error>;
}


/// Computes `sum_l coefficient_l * mean(activation_l ^ 2)` over a set of layers.
///
/// Activations can be cropped by a border before the mean is taken, which keeps the edges of the
/// image out of the loss. The border is ignored for activations too small to be cropped.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    /// (layer index, coefficient), sorted by index
    targets: Vec<(usize, PrimitiveType)>,
    depth: usize,
    border: u64,
}

impl FeatureExtractor {
    /// Creates a feature extractor over the layers of a network.
    ///
    /// Every targeted layer and the layers before it must accept inputs of any height and width.
    pub fn new(network: &Network, weights: &LayerWeights, border: u64) -> Result<FeatureExtractor, Error> {
        if weights.is_empty() {
            return Err(Error::EmptyLayerSequence);
        }

        let mut targets = Vec::with_capacity(weights.len());
        for (name, coefficient) in weights.iter() {
            let idx = network.layer_index(name).ok_or_else(|| Error::InvalidLayer(name.clone()))?;
            targets.push((idx, *coefficient));
        }
        targets.sort_by_key(|(idx, _)| *idx);
        let depth = targets.last().map(|(idx, _)| idx + 1).unwrap_or(0);

        for (layer, name) in network.layers().iter().zip(network.layer_names()).take(depth) {
            if !layer.is_resizable() {
                return Err(Error::NonSpatialLayer(name.clone()));
            }
        }

        Ok(FeatureExtractor { targets, depth, border })
    }

    /// Number of layers the input is propagated through.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Checks that an input of the given height and width produces an activation at every layer up
    /// to the deepest target.
    pub fn check_input_size(&self, network: &Network, shape: (u64, u64)) -> Result<(), Error> {
        let mut size = shape;
        for (layer, name) in network.layers().iter().zip(network.layer_names()).take(self.depth) {
            size = layer.spatial_output_size(size)
                .ok_or_else(|| Error::OctaveTooSmall { layer: name.clone(), shape })?;
        }
        Ok(())
    }

    /// Loss contribution of a layer and its derivative with respect to the activation.
    fn seed(&self, idx: usize, activation: &Tensor) -> Option<(PrimitiveType, Tensor)> {
        let coefficient = self.targets.iter().find(|(target, _)| *target == idx)?.1;

        let dims = activation.dims();
        let border = self.border;
        let cropped = border > 0 && dims[0] > 2 * border && dims[1] > 2 * border;
        let mask = if cropped {
            let mut mask = Tensor::zeros(dims);
            let seqs = [
                Seq::new(border as f64, (dims[0] - border - 1) as f64, 1.0),
                Seq::new(border as f64, (dims[1] - border - 1) as f64, 1.0),
                Seq::default(),
                Seq::default(),
            ];
            let ones = Tensor::ones(Dim4::new(&[dims[0] - 2 * border, dims[1] - 2 * border, dims[2], dims[3]]));
            assign_seq(&mut mask, &seqs, &ones);
            Some(mask)
        } else {
            None
        };

        let masked = match &mask {
            Some(mask) => mul(activation, mask, false),
            None => activation.copy(),
        };
        let num_elements = if cropped {
            ((dims[0] - 2 * border) * (dims[1] - 2 * border) * dims[2] * dims[3]) as PrimitiveType
        } else {
            dims.elements() as PrimitiveType
        };

        let loss = coefficient * sum_all(&mul(&masked, &masked, false)).0 as PrimitiveType / num_elements;
        let grad = mul(&masked, &(2. * coefficient / num_elements), false);
        Some((loss, grad))
    }
}

impl Objective for FeatureExtractor {
    fn loss_and_gradient(&self, network: &mut Network, input: &Tensor) -> Result<(PrimitiveType, Tensor), Error> {
        network.input_gradient(input, self.depth, |idx, activation| self.seed(idx, activation))
    }
}

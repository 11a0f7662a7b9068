//! Choice of the layers a dream targets.
use rand::seq::SliceRandom;
use rand::Rng;

use crate::dream::extractor::LayerWeights;
use crate::errors::Error;
use crate::models::Network;
use crate::tensor::PrimitiveType;

/// Coefficient of the last layer of a sequence.
pub const FINAL_COEFFICIENT: PrimitiveType = 15.;
/// Coefficient of every other layer of a sequence.
pub const INNER_COEFFICIENT: PrimitiveType = 6.;

/// The layers a sequence can be drawn from.
///
/// Besides the full list, a palette knows layers that look bad (excluded from filtered draws),
/// layers preferred as second to last of a sequence and layers preferred as last.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerPalette {
    all: Vec<String>,
    almost_final: Vec<String>,
    final_layers: Vec<String>,
    ugly: Vec<String>,
}

impl LayerPalette {
    pub fn new(all: Vec<String>) -> LayerPalette {
        LayerPalette {
            all,
            almost_final: Vec::new(),
            final_layers: Vec::new(),
            ugly: Vec::new(),
        }
    }

    /// Creates a palette from the layers of a network a feature extractor can target.
    pub fn from_network(network: &Network) -> LayerPalette {
        let all = network.layers().iter()
            .zip(network.layer_names())
            .take_while(|(layer, _)| layer.is_resizable())
            .map(|(_, name)| name.clone())
            .collect();
        LayerPalette::new(all)
    }

    /// Sets the preferred and excluded layers. Names missing from the palette are ignored.
    pub fn with_preferences(mut self, almost_final: &[&str], final_layers: &[&str], ugly: &[&str]) -> LayerPalette {
        let known = |names: &[&str]| -> Vec<String> {
            names.iter().filter(|name| self.contains(name)).map(|name| name.to_string()).collect()
        };
        let (almost_final, final_layers, ugly) = (known(almost_final), known(final_layers), known(ugly));
        self.almost_final = almost_final;
        self.final_layers = final_layers;
        self.ugly = ugly;
        self
    }

    pub fn layers(&self) -> &[String] {
        &self.all
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all.iter().any(|layer| layer == name)
    }

    /// Creates a sequence from the given layers, in order.
    pub fn custom<S: AsRef<str>>(&self, names: &[S]) -> Result<LayerSequence, Error> {
        if names.is_empty() {
            return Err(Error::EmptyLayerSequence);
        }
        for name in names {
            if !self.contains(name.as_ref()) {
                return Err(Error::InvalidLayer(name.as_ref().to_string()));
            }
        }
        Ok(LayerSequence { names: names.iter().map(|name| name.as_ref().to_string()).collect() })
    }

    /// Draws `count` layers uniformly from the whole palette.
    pub fn random<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Result<LayerSequence, Error> {
        if count == 0 || self.all.is_empty() {
            return Err(Error::EmptyLayerSequence);
        }
        let names: Vec<&String> = (0..count).filter_map(|_| self.all.choose(rng)).collect();
        self.custom(&names)
    }

    /// Draws `count` layers, avoiding the bad looking ones.
    ///
    /// The second to last layer is drawn from the almost final layers and the last from the final
    /// layers. Each list falls back to the filtered palette when it is empty.
    pub fn filtered_random<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Result<LayerSequence, Error> {
        let clean: Vec<&String> = self.all.iter().filter(|layer| !self.ugly.contains(layer)).collect();
        if count == 0 || clean.is_empty() {
            return Err(Error::EmptyLayerSequence);
        }
        let almost_final: Vec<&String> = if self.almost_final.is_empty() { clean.clone() } else { self.almost_final.iter().collect() };
        let final_layers: Vec<&String> = if self.final_layers.is_empty() { clean.clone() } else { self.final_layers.iter().collect() };

        let mut names: Vec<&String> = Vec::with_capacity(count);
        for i in 0..count {
            let pool = if i + 2 < count {
                &clean
            } else if i + 1 < count {
                &almost_final
            } else {
                &final_layers
            };
            if let Some(name) = pool.choose(rng) {
                names.push(*name);
            }
        }
        self.custom(&names)
    }
}


/// Ordered list of layers to dream with.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSequence {
    names: Vec<String>,
}

impl LayerSequence {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Weights the last layer with `FINAL_COEFFICIENT` and the others with `INNER_COEFFICIENT`.
    ///
    /// A layer drawn several times appears once, at its first position, with the coefficient of its
    /// last occurrence.
    pub fn to_weights(&self) -> LayerWeights {
        let last = self.names.len().saturating_sub(1);
        self.names.iter().enumerate()
            .map(|(i, name)| (name.clone(), if i == last { FINAL_COEFFICIENT } else { INNER_COEFFICIENT }))
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use crate::dream::selection::*;
    use crate::errors::Error;

    fn palette() -> LayerPalette {
        let all = ["input", "conv2d", "conv2d_1", "mixed0", "mixed1", "mixed2", "mixed3", "activation_19"];
        LayerPalette::new(all.iter().map(|name| name.to_string()).collect())
            .with_preferences(&["mixed1", "activation_19", "unknown"], &["mixed2", "mixed3"], &["input", "conv2d"])
    }

    #[test]
    fn test_custom_sequence() {
        let palette = palette();
        let sequence = palette.custom(&["mixed0", "mixed3"]).unwrap();
        assert_eq!(sequence.names(), ["mixed0", "mixed3"]);

        match palette.custom(&["mixed9"]) {
            Err(Error::InvalidLayer(name)) => assert_eq!(name, "mixed9"),
            _ => panic!("expected an invalid layer error"),
        }
        let empty: [&str; 0] = [];
        assert!(palette.custom(&empty).is_err());
    }

    #[test]
    fn test_random_sequence() {
        let palette = palette();
        let mut rng = StdRng::seed_from_u64(7);
        let sequence = palette.random(5, &mut rng).unwrap();
        assert_eq!(sequence.names().len(), 5);
        assert!(sequence.names().iter().all(|name| palette.contains(name)));
        assert!(palette.random(0, &mut rng).is_err());
    }

    #[test]
    fn test_filtered_random_sequence() {
        let palette = palette();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let sequence = palette.filtered_random(4, &mut rng).unwrap();
            let names = sequence.names();
            assert_eq!(names.len(), 4);
            assert!(names.iter().all(|name| name != "input" && name != "conv2d"));
            assert!(["mixed1", "activation_19"].contains(&names[2].as_str()));
            assert!(["mixed2", "mixed3"].contains(&names[3].as_str()));
        }

        let single = palette.filtered_random(1, &mut rng).unwrap();
        assert!(["mixed2", "mixed3"].contains(&single.names()[0].as_str()));
    }

    #[test]
    fn test_sequence_weights() {
        let palette = palette();
        let weights = palette.custom(&["mixed0", "mixed1", "mixed3"]).unwrap().to_weights();
        assert_eq!(weights.coefficients().collect::<Vec<f32>>(), [6., 6., 15.]);

        let weights = palette.custom(&["mixed3", "mixed1", "mixed3"]).unwrap().to_weights();
        assert_eq!(weights.names().collect::<Vec<&str>>(), ["mixed3", "mixed1"]);
        assert_eq!(weights.get("mixed3"), Some(15.));
    }
}

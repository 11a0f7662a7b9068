//! GAP, the Generative Art Producer.
//!
//! DeepDream style image synthesis by octave gradient ascent over the input pixels of a
//! convolutional network, a small binary image classifier pipeline and the dataset
//! utilities that prepare its inputs. The numerics run on ArrayFire.
pub mod activations;
pub mod callbacks;
pub mod data;
pub mod dream;
pub mod errors;
pub mod imaging;
pub mod initializers;
mod io;
pub mod layers;
pub mod losses;
pub mod metrics;
pub mod models;
pub mod optimizers;
pub mod params;
pub mod signal;
pub mod tensor;
pub mod training;
pub mod visualize;


#[macro_export]
macro_rules! assert_approx_eq {
    ($a:expr, $b:expr) => {{
        $crate::assert_approx_eq!($a, $b, 1e-6)
    }};
    ($a:expr, $b:expr, $eps:expr) => {{
        let eps = $eps;
        let (a, b) = ($a, $b);
        assert_eq!(a.len(), b.len(), "assertion failed: lengths differ");
        for (i,_) in a.iter().enumerate() {
            assert!(
            (a[i] - b[i]).abs() < eps,
            "assertion failed: `(left !== right)` \
             (left: `{:?}`, right: `{:?}`, expect diff: `{:?}`, real diff: `{:?}`)",
            a[i],
            b[i],
            eps,
            (a[i] - b[i]).abs()
        );
        }
    }};
}

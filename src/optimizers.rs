//! Optimizers used to train the neural network.
use arrayfire::*;

use crate::errors::Error;
use crate::io::{read_scalar, read_strings, read_vec_tensor, save_vec_tensor, write_scalar, write_strings};
use crate::layers::Layer;
use crate::tensor::*;


/// Defines the trait that needs to be implemented by any optimizer.
pub trait Optimizer
{
    fn name(&self) -> &str;
    fn update_parameters(&mut self, layer: &mut dyn Layer, layer_idx: usize);
    fn update_time_step(&mut self) {}
    fn initialize_parameters(&mut self, layers_dims: Vec<(Dim, Dim)>);
    fn save(&self, file: &hdf5::File) -> Result<(), Error>;
}

/// Creates the optimizer stored in the `optimizer` group of a model file.
pub(crate) fn optimizer_from_hdf5_group(group: &hdf5::Group) -> Result<Box<dyn Optimizer>, Error> {
    let optimizer_type = read_strings(group, "type")?.pop().unwrap_or_default();
    match optimizer_type.as_str() {
        SGD::NAME => Ok(SGD::from_hdf5_group(group)?),
        Adam::NAME => Ok(Adam::from_hdf5_group(group)?),
        RMSProp::NAME => Ok(RMSProp::from_hdf5_group(group)?),
        _ => Err(Error::UnknownOptimizer(optimizer_type)),
    }
}

fn create_optimizer_group(file: &hdf5::File, name: &str) -> Result<hdf5::Group, Error> {
    let optimizer = file.create_group("optimizer")?;
    write_strings(&optimizer, "type", &[name.to_string()])?;
    Ok(optimizer)
}

fn save_estimates(group: &hdf5::Group, estimates: &[Vec<Tensor>; 2], name: &str) -> Result<(), Error> {
    for (i, estimate) in estimates.iter().enumerate() {
        if !estimate.is_empty() {
            save_vec_tensor(group, estimate, &format!("{}_{}", name, i))?;
        }
    }
    Ok(())
}

fn read_estimates(group: &hdf5::Group, name: &str) -> Result<[Vec<Tensor>; 2], Error> {
    let mut estimates: [Vec<Tensor>; 2] = Default::default();
    for (i, estimate) in estimates.iter_mut().enumerate() {
        let dataset_name = format!("{}_{}", name, i);
        if group.link_exists(&dataset_name) {
            *estimate = read_vec_tensor(group, &dataset_name)?;
        }
    }
    Ok(estimates)
}

/// Computes `value * factor + other * (1 - factor)`.
fn moving_average(value: &Tensor, other: &Tensor, factor: PrimitiveType) -> Tensor {
    add(&mul(value, &factor, false), &mul(other, &(1. - factor), false), false)
}


/// Stochastic Gradient Descent
pub struct SGD {
    learning_rate: PrimitiveType,
    momentum: PrimitiveType,
    first_moment_est: [Vec<Tensor>; 2],
}

impl SGD {

    pub(crate) const NAME: &'static str = "SGD";

    /// Creates a Stochastic Gradient Descent optimizer.
    pub fn new(learning_rate: PrimitiveType) -> SGD {
        SGD::with_param(learning_rate, 0.0)
    }

    /// Creates a Stochastic Gradient Descent optimizer with momentum estimation.
    pub fn with_param(learning_rate: PrimitiveType, momentum: PrimitiveType) -> SGD {
        SGD {
            learning_rate,
            momentum,
            first_moment_est: Default::default(),
        }
    }

    pub(crate) fn from_hdf5_group(group: &hdf5::Group) -> Result<Box<SGD>, Error> {
        Ok(Box::new(SGD {
            learning_rate: read_scalar(group, "learning_rate")?,
            momentum: read_scalar(group, "momentum")?,
            first_moment_est: read_estimates(group, "first_moment_est")?,
        }))
    }
}


impl Optimizer for SGD
{
    fn name(&self) -> &str {
        Self::NAME
    }

    fn update_parameters(&mut self,
                         layer: &mut dyn Layer,
                         layer_idx: usize
    ) {
        if let Some((mut param, dparam)) = layer.parameters_mut() {
            for i in 0..param.len() {
                self.first_moment_est[i][layer_idx] = moving_average(&self.first_moment_est[i][layer_idx], dparam[i], self.momentum);
                let update = mul(&self.first_moment_est[i][layer_idx], &self.learning_rate, false);
                *param[i] = sub(&*param[i], &update, false);
            }
        }
    }

    fn initialize_parameters(&mut self, layers_dims: Vec<(Dim, Dim)>) {
        self.first_moment_est = Default::default();
        for dim in layers_dims {
            self.first_moment_est[0].push(Tensor::zeros(dim.0));
            self.first_moment_est[1].push(Tensor::zeros(dim.1));
        }
    }

    fn save(&self, file: &hdf5::File) -> Result<(), Error> {
        let optimizer = create_optimizer_group(file, Self::NAME)?;
        write_scalar(&optimizer, "learning_rate", self.learning_rate)?;
        write_scalar(&optimizer, "momentum", self.momentum)?;
        save_estimates(&optimizer, &self.first_moment_est, "first_moment_est")?;
        Ok(())
    }
}


/// Adaptive moments estimation
pub struct Adam {
    learning_rate: PrimitiveType,
    beta1: PrimitiveType,
    beta2: PrimitiveType,
    eps: PrimitiveType,
    time_step: i32,
    first_moment_est: [Vec<Tensor>; 2],
    second_moment_est: [Vec<Tensor>; 2],
}

impl Adam {

    pub(crate) const NAME: &'static str = "Adam";

    /// Creates an Adam optimizer.
    ///
    /// The exponential decay rates for the first and second moment estimates are set to 0.9 and 0.999 respectively.
    /// The epsilon value used for numerical stability is 1e-7.
    ///
    pub fn new(learning_rate: PrimitiveType) -> Adam {
        Adam::with_param(learning_rate, 0.9, 0.999, 1e-7)
    }

    /// Creates an Adam optimizer with the given parameters.
    ///
    /// # Arguments
    /// * `learning_rate` - learning rate used to update the parameters of the layers.
    /// * `beta1` - exponential decay rate for the first moment estimate.
    /// * `beta2` - exponential decay rate for the second moment estimate.
    /// * `eps` - small constant used for numerical stability.
    ///
    pub fn with_param(learning_rate: PrimitiveType,
                      beta1: PrimitiveType,
                      beta2: PrimitiveType,
                      eps: PrimitiveType
    ) -> Adam {
        Adam {
            learning_rate,
            beta1,
            beta2,
            eps,
            time_step: 0,
            first_moment_est: Default::default(),
            second_moment_est: Default::default(),
        }
    }

    pub(crate) fn from_hdf5_group(group: &hdf5::Group) -> Result<Box<Adam>, Error> {
        Ok(Box::new(Adam {
            learning_rate: read_scalar(group, "learning_rate")?,
            beta1: read_scalar(group, "beta1")?,
            beta2: read_scalar(group, "beta2")?,
            eps: read_scalar(group, "eps")?,
            time_step: read_scalar(group, "time_step")?,
            first_moment_est: read_estimates(group, "first_moment_est")?,
            second_moment_est: read_estimates(group, "second_moment_est")?,
        }))
    }
}

impl Optimizer for Adam
{
    fn name(&self) -> &str {
        Self::NAME
    }

    fn update_parameters(&mut self,
                         layer: &mut dyn Layer,
                         layer_idx: usize
    ) {
        if let Some((mut param, dparam)) = layer.parameters_mut() {

            for i in 0..param.len() {
                // Update the biased first and second moment estimates
                self.first_moment_est[i][layer_idx] = moving_average(&self.first_moment_est[i][layer_idx], dparam[i], self.beta1);
                self.second_moment_est[i][layer_idx] = moving_average(&self.second_moment_est[i][layer_idx], &mul(dparam[i], dparam[i], false), self.beta2);

                // Correct both estimates
                let first_moment_est_corr = div(&self.first_moment_est[i][layer_idx], &(1. - self.beta1.powi(self.time_step)), false);
                let second_moment_est_corr = div(&self.second_moment_est[i][layer_idx], &(1. - self.beta2.powi(self.time_step)), false);

                // Update the parameter
                let denominator = add(&sqrt(&second_moment_est_corr), &self.eps, false);
                let update = mul(&div(&first_moment_est_corr, &denominator, false), &self.learning_rate, false);
                *param[i] = sub(&*param[i], &update, false);
            }
        }
    }

    fn update_time_step(&mut self) {
        self.time_step += 1;
    }

    fn initialize_parameters(&mut self, layers_dims: Vec<(Dim, Dim)>) {
        self.first_moment_est = Default::default();
        self.second_moment_est = Default::default();
        for dim in layers_dims {
            self.first_moment_est[0].push(Tensor::zeros(dim.0));
            self.second_moment_est[0].push(Tensor::zeros(dim.0));
            self.first_moment_est[1].push(Tensor::zeros(dim.1));
            self.second_moment_est[1].push(Tensor::zeros(dim.1));
        }
    }

    fn save(&self, file: &hdf5::File) -> Result<(), Error> {
        let optimizer = create_optimizer_group(file, Self::NAME)?;
        write_scalar(&optimizer, "learning_rate", self.learning_rate)?;
        write_scalar(&optimizer, "beta1", self.beta1)?;
        write_scalar(&optimizer, "beta2", self.beta2)?;
        write_scalar(&optimizer, "eps", self.eps)?;
        write_scalar(&optimizer, "time_step", self.time_step)?;
        save_estimates(&optimizer, &self.first_moment_est, "first_moment_est")?;
        save_estimates(&optimizer, &self.second_moment_est, "second_moment_est")?;
        Ok(())
    }
}


/// RMSProp
pub struct RMSProp {
    learning_rate: PrimitiveType,
    decay_rate: PrimitiveType,
    eps: PrimitiveType,
    first_moment_est: [Vec<Tensor>; 2],
}

impl RMSProp {

    pub(crate) const NAME: &'static str = "RMSProp";

    /// Creates an RMSProp optimizer.
    ///
    /// The exponential decay rate for the first moment estimate is set to 0.9 and the epsilon value used for
    /// numerical stability to 1e-7.
    ///
    pub fn new(learning_rate: PrimitiveType) -> RMSProp {
        RMSProp::with_param(learning_rate, 0.9, 1e-7)
    }

    /// Creates an RMSProp optimizer with the given parameters.
    pub fn with_param(learning_rate: PrimitiveType,
                      decay_rate: PrimitiveType,
                      eps: PrimitiveType
    ) -> RMSProp {
        RMSProp {
            learning_rate,
            decay_rate,
            eps,
            first_moment_est: Default::default(),
        }
    }

    pub(crate) fn from_hdf5_group(group: &hdf5::Group) -> Result<Box<RMSProp>, Error> {
        Ok(Box::new(RMSProp {
            learning_rate: read_scalar(group, "learning_rate")?,
            decay_rate: read_scalar(group, "decay_rate")?,
            eps: read_scalar(group, "eps")?,
            first_moment_est: read_estimates(group, "first_moment_est")?,
        }))
    }
}

impl Optimizer for RMSProp
{
    fn name(&self) -> &str {
        Self::NAME
    }

    fn update_parameters(&mut self,
                         layer: &mut dyn Layer,
                         layer_idx: usize
    ) {
        if let Some((mut param, dparam)) = layer.parameters_mut() {
            for i in 0..param.len() {
                self.first_moment_est[i][layer_idx] = moving_average(&self.first_moment_est[i][layer_idx], &mul(dparam[i], dparam[i], false), self.decay_rate);
                let denominator = add(&sqrt(&self.first_moment_est[i][layer_idx]), &self.eps, false);
                let update = mul(&div(dparam[i], &denominator, false), &self.learning_rate, false);
                *param[i] = sub(&*param[i], &update, false);
            }
        }
    }

    fn initialize_parameters(&mut self, layers_dims: Vec<(Dim, Dim)>) {
        self.first_moment_est = Default::default();
        for dim in layers_dims {
            self.first_moment_est[0].push(Tensor::zeros(dim.0));
            self.first_moment_est[1].push(Tensor::zeros(dim.1));
        }
    }

    fn save(&self, file: &hdf5::File) -> Result<(), Error> {
        let optimizer = create_optimizer_group(file, Self::NAME)?;
        write_scalar(&optimizer, "learning_rate", self.learning_rate)?;
        write_scalar(&optimizer, "decay_rate", self.decay_rate)?;
        write_scalar(&optimizer, "eps", self.eps)?;
        save_estimates(&optimizer, &self.first_moment_est, "first_moment_est")?;
        Ok(())
    }
}

use hdf5_sys::h5::{H5_INDEX_CRT_ORDER, H5_ITER_INC};
use hdf5_sys::h5p::{H5P_DEFAULT, H5P_CRT_ORDER_INDEXED, H5P_CRT_ORDER_TRACKED, H5P_CLS_LINK_CREATE, H5P_CLS_GROUP_CREATE};
use hdf5::types::VarLenUnicode;
use std::ffi::{CStr, CString};
use std::str::FromStr;

use crate::errors::Error;
use crate::tensor::*;

/// Creates an H5 group with creation order tracked and indexed.
///
/// # Arguments
///
/// * `parent` - The group (or file) in which the group is created.
/// * `group_name` - The name of the group.
pub(crate) fn create_group(parent: &hdf5::Group, group_name: &str) -> Result<hdf5::Group, Error> {
    let name = CString::new(group_name).map_err(|_| Error::InvalidString(group_name.to_string()))?;
    unsafe {
        let lcpl = hdf5_sys::h5p::H5Pcreate(*H5P_CLS_LINK_CREATE);
        let gcpl = hdf5_sys::h5p::H5Pcreate(*H5P_CLS_GROUP_CREATE);
        hdf5_sys::h5p::H5Pset_link_creation_order(gcpl, H5P_CRT_ORDER_TRACKED | H5P_CRT_ORDER_INDEXED);
        let group_id = hdf5_sys::h5g::H5Gcreate2(parent.id(), name.as_ptr(), lcpl, gcpl, H5P_DEFAULT);
        if group_id >= 0 {
            hdf5_sys::h5g::H5Gclose(group_id);
        }
        hdf5_sys::h5p::H5Pclose(gcpl);
        hdf5_sys::h5p::H5Pclose(lcpl);
    }
    Ok(parent.group(group_name)?)
}

/// Lists the subgroups contained in a group.
///
/// # Return value
///
/// Vector containing the names of the subgroups, listed by creation order.
pub(crate) fn list_subgroups(group: &hdf5::Group) -> Vec<String> {
    extern "C" fn members_callback(
        _id: hdf5_sys::h5i::hid_t, name: *const std::os::raw::c_char, _info: *const hdf5_sys::h5l::H5L_info_t, op_data: *mut std::os::raw::c_void,
    ) -> hdf5_sys::h5::herr_t {
        let other_data: &mut Vec<String> = unsafe { &mut *(op_data as *mut Vec<String>) };
        let name_str = unsafe { CStr::from_ptr(name) };
        match name_str.to_str() {
            Ok(name_str) => {
                other_data.push(name_str.to_owned());
                0
            },
            Err(_) => -1,
        }
    }
    let callback_fn: hdf5_sys::h5l::H5L_iterate_t = Some(members_callback);
    let mut result: Vec<String> = Vec::new();
    let other_data: *mut std::os::raw::c_void = &mut result as *mut _ as *mut std::os::raw::c_void;
    let iteration_position: *mut hdf5_sys::h5::hsize_t = &mut { 0 as u64 };
    unsafe {
        hdf5_sys::h5l::H5Literate(group.id(), H5_INDEX_CRT_ORDER, H5_ITER_INC, iteration_position, callback_fn, other_data);
    }
    result
}

/// Converts a string into its HDF5 variable length representation.
pub(crate) fn to_h5_string(value: &str) -> Result<VarLenUnicode, Error> {
    VarLenUnicode::from_str(value).map_err(|_| Error::InvalidString(value.to_string()))
}

pub(crate) fn write_scalar<T: hdf5::H5Type>(group: &hdf5::Group, name: &str, value: T) -> Result<(), Error> {
    let dataset = group.new_dataset::<T>().create(name, 1)?;
    dataset.write(std::slice::from_ref(&value))?;
    Ok(())
}

pub(crate) fn read_scalar<T: hdf5::H5Type + Clone>(group: &hdf5::Group, name: &str) -> Result<T, Error> {
    let values = group.dataset(name)?.read_raw::<T>()?;
    values.into_iter().next().ok_or_else(|| Error::HDF5Error(hdf5::Error::from(format!("The dataset {} is empty.", name))))
}

pub(crate) fn write_strings(group: &hdf5::Group, name: &str, values: &[String]) -> Result<(), Error> {
    let values = values.iter().map(|value| to_h5_string(value)).collect::<Result<Vec<VarLenUnicode>, Error>>()?;
    let dataset = group.new_dataset::<VarLenUnicode>().create(name, values.len())?;
    dataset.write(values.as_slice())?;
    Ok(())
}

pub(crate) fn read_strings(group: &hdf5::Group, name: &str) -> Result<Vec<String>, Error> {
    let values = group.dataset(name)?.read_raw::<VarLenUnicode>()?;
    Ok(values.iter().map(|value| value.as_str().to_string()).collect())
}

/// Saves a slice of tensors in an HDF5 group.
///
/// # Arguments
///
/// * `group` - The group where the vector is saved.
/// * `slice` - A slice containing the tensors.
/// * `name` - The name of the dataset where the vector is saved.
pub(crate) fn save_vec_tensor(group: &hdf5::Group,
                              slice: &[Tensor],
                              name: &str
) -> Result<(), Error> {
    let values: Vec<H5Tensor> = slice.iter().map(H5Tensor::from).collect();
    let ds = group.new_dataset::<H5Tensor>().create(name, values.len())?;
    ds.write(values.as_slice())?;
    Ok(())
}

/// Reads a vector of tensors written by `save_vec_tensor`.
pub(crate) fn read_vec_tensor(group: &hdf5::Group, name: &str) -> Result<Vec<Tensor>, Error> {
    let values = group.dataset(name)?.read_raw::<H5Tensor>()?;
    Ok(values.iter().map(Tensor::from).collect())
}

/// Reads the single tensor stored under `name`.
pub(crate) fn read_tensor(group: &hdf5::Group, name: &str) -> Result<Tensor, Error> {
    let mut tensors = read_vec_tensor(group, name)?;
    tensors.pop().ok_or_else(|| Error::HDF5Error(hdf5::Error::from(format!("The dataset {} is empty.", name))))
}

//! Conversions between python objects and the adapter contract types, shared by the python
//! backed adapters.

use envrig_core::{Error, frame::Frame, tensor::Buffer};
use pyo3::{
    Bound, PyAny, PyResult, Python,
    types::{PyAnyMethods, PyBytes, PyBytesMethods, PyDict, PyDictMethods},
};

/// Folds a failure raised inside a `with_gil` block back into the crate error. Errors that
/// already are adapter errors keep their kind, everything else is a backend failure.
pub fn into_error(err: anyhow::Error) -> Error {
    match err.downcast::<Error>() {
        Ok(err) => err,
        Err(err) => Error::Backend(err),
    }
}

/// Reads any array like object (numpy array, torch tensor, python scalar or list) as a flat
/// `f32` buffer together with its shape.
pub fn to_buffer(py: Python<'_>, obj: &Bound<'_, PyAny>) -> PyResult<Buffer> {
    let obj = if obj.hasattr("detach")? {
        obj.call_method0("detach")?
            .call_method0("cpu")?
            .call_method0("numpy")?
    } else {
        obj.clone()
    };
    let numpy = py.import("numpy")?;
    let kwargs = PyDict::new(py);
    kwargs.set_item("dtype", numpy.getattr("float32")?)?;
    let array = numpy.call_method("asarray", (obj,), Some(&kwargs))?;
    let shape: Vec<usize> = array.getattr("shape")?.extract()?;
    let data: Vec<f32> = array.call_method0("flatten")?.call_method0("tolist")?.extract()?;
    Ok(Buffer { data, shape })
}

/// Builds a `float32` numpy array of `buffer.shape` from `buffer`.
pub fn to_ndarray<'py>(py: Python<'py>, buffer: &Buffer) -> PyResult<Bound<'py, PyAny>> {
    let numpy = py.import("numpy")?;
    let kwargs = PyDict::new(py);
    kwargs.set_item("dtype", numpy.getattr("float32")?)?;
    let array = numpy.call_method("asarray", (buffer.data.clone(),), Some(&kwargs))?;
    array.call_method1("reshape", (buffer.shape.clone(),))
}

/// Reads an `rgb_array` render result, an `(height, width, 3 | 4)` uint8 array.
pub fn to_frame(py: Python<'_>, obj: &Bound<'_, PyAny>) -> anyhow::Result<Frame> {
    let numpy = py.import("numpy")?;
    let array = numpy.call_method1("ascontiguousarray", (obj,))?;
    let array = array.call_method1("astype", ("uint8",))?;
    let shape: Vec<usize> = array.getattr("shape")?.extract()?;
    let [height, width, channels] = shape[..] else {
        return Err(Error::InvalidFrame(format!("expected an image array, got shape {shape:?}")).into());
    };
    let raw = array.call_method0("tobytes")?;
    let bytes = raw.downcast::<PyBytes>().map_err(pyo3::PyErr::from)?;
    Ok(Frame::from_raw(height, width, channels, bytes.as_bytes().to_vec())?)
}

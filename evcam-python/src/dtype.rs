//! numpy structured dtypes for the event records.
//!
//! The wrappers are `#[repr(transparent)]`, so a `Vec<CdEvent>` can be
//! reinterpreted as `Vec<CdRecord>` and moved into numpy as-is. The dtypes
//! use the `#[repr(C)]` offsets of the core records, so numpy sees exactly
//! the Rust memory layout.

use std::mem::{offset_of, size_of, ManuallyDrop};

use evcam_core::{CdEvent, TriggerEvent};
use numpy::{Element, PyArrayDescr};
use pyo3::sync::GILOnceCell;
use pyo3::types::PyDict;
use pyo3::{Py, PyResult, Python};

/// (name, numpy format, byte offset)
type FieldSpec = (&'static str, &'static str, usize);

const CD_FIELDS: [FieldSpec; 4] = [
    ("x", "u2", offset_of!(CdEvent, x)),
    ("y", "u2", offset_of!(CdEvent, y)),
    ("p", "u1", offset_of!(CdEvent, p)),
    ("t", "i8", offset_of!(CdEvent, t)),
];

const TRIGGER_FIELDS: [FieldSpec; 3] = [
    ("p", "i2", offset_of!(TriggerEvent, p)),
    ("t", "i8", offset_of!(TriggerEvent, t)),
    ("id", "i2", offset_of!(TriggerEvent, id)),
];

fn structured_dtype<'py>(
    py: Python<'py>,
    fields: &[FieldSpec],
    itemsize: usize,
) -> PyResult<&'py PyArrayDescr> {
    let descr = PyDict::new(py);
    descr.set_item("names", fields.iter().map(|f| f.0).collect::<Vec<_>>())?;
    descr.set_item("formats", fields.iter().map(|f| f.1).collect::<Vec<_>>())?;
    descr.set_item("offsets", fields.iter().map(|f| f.2).collect::<Vec<_>>())?;
    descr.set_item("itemsize", itemsize)?;
    PyArrayDescr::new(py, descr)
}

static CD_DTYPE: GILOnceCell<Py<PyArrayDescr>> = GILOnceCell::new();
static TRIGGER_DTYPE: GILOnceCell<Py<PyArrayDescr>> = GILOnceCell::new();

/// Builds both record dtypes. Called from module init, so a failure
/// surfaces as an import error.
pub fn register_dtypes(py: Python<'_>) -> PyResult<()> {
    CD_DTYPE.get_or_try_init(py, || {
        structured_dtype(py, &CD_FIELDS, size_of::<CdEvent>()).map(Into::into)
    })?;
    TRIGGER_DTYPE.get_or_try_init(py, || {
        structured_dtype(py, &TRIGGER_FIELDS, size_of::<TriggerEvent>()).map(Into::into)
    })?;
    Ok(())
}

/// `Element::get_dtype` cannot fail; the module only becomes importable
/// after `register_dtypes` succeeded.
fn registered<'py>(
    py: Python<'py>,
    cell: &'py GILOnceCell<Py<PyArrayDescr>>,
) -> &'py PyArrayDescr {
    match cell.get(py) {
        Some(descr) => descr.as_ref(py),
        None => panic!("record dtypes used before the _evcam module was initialized"),
    }
}

/// A CD event as a numpy array element.
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct CdRecord(pub CdEvent);

/// A trigger event as a numpy array element.
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct TriggerRecord(pub TriggerEvent);

unsafe impl Element for CdRecord {
    const IS_COPY: bool = true;

    fn get_dtype(py: Python<'_>) -> &PyArrayDescr {
        registered(py, &CD_DTYPE)
    }
}

unsafe impl Element for TriggerRecord {
    const IS_COPY: bool = true;

    fn get_dtype(py: Python<'_>) -> &PyArrayDescr {
        registered(py, &TRIGGER_DTYPE)
    }
}

/// Rewraps extracted CD events without touching the allocation.
pub fn cd_records(events: Vec<CdEvent>) -> Vec<CdRecord> {
    let mut events = ManuallyDrop::new(events);
    // SAFETY: CdRecord is repr(transparent) over CdEvent, so pointer,
    // length and capacity describe the same allocation layout.
    unsafe {
        Vec::from_raw_parts(
            events.as_mut_ptr().cast::<CdRecord>(),
            events.len(),
            events.capacity(),
        )
    }
}

/// Rewraps extracted trigger events without touching the allocation.
pub fn trigger_records(events: Vec<TriggerEvent>) -> Vec<TriggerRecord> {
    let mut events = ManuallyDrop::new(events);
    // SAFETY: TriggerRecord is repr(transparent) over TriggerEvent.
    unsafe {
        Vec::from_raw_parts(
            events.as_mut_ptr().cast::<TriggerRecord>(),
            events.len(),
            events.capacity(),
        )
    }
}

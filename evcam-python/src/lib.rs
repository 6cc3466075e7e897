//! Python bindings for the event camera decoder with zero-copy numpy support.
//!
//! Decoded events are returned as numpy structured arrays whose memory is
//! the Rust buffer itself: the accumulator hands its `Vec` over and numpy
//! takes ownership, so no event is copied.

mod dtype;

use dtype::{cd_records, trigger_records, CdRecord, TriggerRecord};
use evcam_core::{DecodeError, DecodeParams, Session};
use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1, PyUntypedArray};
use pyo3::exceptions::{PyAttributeError, PyException, PyTypeError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyList};

pyo3::create_exception!(_evcam, DecoderError, PyException);

/// Maps a decode error onto the matching Python exception.
fn to_py_err(err: DecodeError) -> PyErr {
    match &err {
        DecodeError::MissingField(_) => PyAttributeError::new_err(err.to_string()),
        DecodeError::InvalidShape(_) => PyTypeError::new_err(err.to_string()),
        DecodeError::UnsupportedEncoding { .. } | DecodeError::MalformedPayload { .. } => {
            DecoderError::new_err(err.to_string())
        }
    }
}

/// Reads a named field from a message-like object.
fn get_attr<'py, T: FromPyObject<'py>>(msg: &'py PyAny, name: &str) -> PyResult<T> {
    if !msg.hasattr(name)? {
        return Err(to_py_err(DecodeError::MissingField(name.to_string())));
    }
    msg.getattr(name)?.extract()
}

/// Reads encoding, geometry and time base from a message-like object.
fn message_params(msg: &PyAny) -> PyResult<DecodeParams> {
    Ok(DecodeParams::new(
        get_attr::<String>(msg, "encoding")?,
        get_attr::<u32>(msg, "width")?,
        get_attr::<u32>(msg, "height")?,
        get_attr::<u64>(msg, "time_base")?,
    ))
}

fn invalid_array() -> PyErr {
    to_py_err(DecodeError::InvalidShape(
        "Input events must be 1-D numpy array of type uint8".to_string(),
    ))
}

/// Borrows a 1-D uint8 numpy array.
fn byte_array(events: &PyAny) -> PyResult<PyReadonlyArray1<'_, u8>> {
    let array = events
        .downcast::<PyArray1<u8>>()
        .map_err(|_| invalid_array())?;
    Ok(array.readonly())
}

/// Copies a payload that cannot be borrowed: strided uint8 arrays and
/// plain sequences of ints.
fn collect_bytes(events: &PyAny) -> PyResult<Vec<u8>> {
    if events.downcast::<PyUntypedArray>().is_ok() {
        let array = byte_array(events)?;
        return Ok(array.as_array().iter().copied().collect());
    }
    events.extract()
}

/// A collected payload and the Python object it was collected from.
type Collected = Option<(PyObject, Vec<u8>)>;

/// Runs `f` on the bytes of an event payload.
///
/// `bytes` and contiguous uint8 arrays are borrowed. Anything else is
/// collected into `collected`, which is reused while the same object is
/// passed again, so a resumed decode_until sees the same buffer.
fn with_payload<R>(
    events: &PyAny,
    collected: &mut Collected,
    f: impl FnOnce(&[u8]) -> PyResult<R>,
) -> PyResult<R> {
    if let Ok(bytes) = events.downcast::<PyBytes>() {
        return f(bytes.as_bytes());
    }
    if events.downcast::<PyUntypedArray>().is_ok() {
        let array = byte_array(events)?;
        if let Ok(slice) = array.as_slice() {
            return f(slice);
        }
    }

    let same_source = match collected {
        Some((source, _)) => source.as_ptr() == events.as_ptr(),
        None => false,
    };
    if !same_source {
        *collected = Some((events.into(), collect_bytes(events)?));
    }
    f(collected
        .as_ref()
        .map(|(_, bytes)| bytes.as_slice())
        .unwrap_or_default())
}

/// Decodes event packets into numpy structured arrays.
///
/// The decoder keeps state in between calls to decode(). After each decode
/// the events must be read via get_cd_events() / get_ext_trig_events()
/// before decoding again, otherwise they are lost.
///
/// Example:
///     >>> decoder = Decoder()
///     >>> for msg in msgs:
///     ...     decoder.decode(msg)
///     ...     cd_events = decoder.get_cd_events()
///     ...     trig_events = decoder.get_ext_trig_events()
#[pyclass(unsendable, name = "Decoder")]
pub struct Decoder {
    session: Session,
    collected: Collected,
}

#[pymethods]
impl Decoder {
    #[new]
    fn new() -> Self {
        Self {
            session: Session::new(),
            collected: None,
        }
    }

    /// Decodes a message with fields encoding, width, height, time_base
    /// and events.
    fn decode(&mut self, msg: &PyAny) -> PyResult<()> {
        let params = message_params(msg)?;
        let events = get_attr::<&PyAny>(msg, "events")?;
        self.collected = None;
        let session = &mut self.session;
        with_payload(events, &mut self.collected, |payload| {
            session
                .decode_packet(&params.packet(payload))
                .map_err(to_py_err)
        })
    }

    /// Decodes a message up to (excluding) `until_time`.
    ///
    /// Returns:
    ///     tuple: (reached_limit, next_time). Call again with the same
    ///     message and a later time to continue where decoding stopped.
    ///     A sequence payload must not be modified in between.
    fn decode_until(&mut self, msg: &PyAny, until_time: u64) -> PyResult<(bool, u64)> {
        let params = message_params(msg)?;
        let events = get_attr::<&PyAny>(msg, "events")?;
        let session = &mut self.session;
        with_payload(events, &mut self.collected, |payload| {
            session
                .decode_packet_until(&params.packet(payload), until_time)
                .map(Into::into)
                .map_err(to_py_err)
        })
    }

    /// Decodes a bytes buffer of encoded events.
    ///
    /// Args:
    ///     encoding: Encoding string (e.g. "evt3") as provided by the message
    ///     width: Sensor width in pixels
    ///     height: Sensor height in pixels
    ///     time_base: Time base as provided by the message
    ///     events: Encoded events
    fn decode_bytes(
        &mut self,
        encoding: &str,
        width: u32,
        height: u32,
        time_base: u64,
        events: &PyBytes,
    ) -> PyResult<()> {
        let params = DecodeParams::new(encoding, width, height, time_base);
        self.session
            .decode_packet(&params.packet(events.as_bytes()))
            .map_err(to_py_err)
    }

    /// Same as decode_bytes() but takes a 1-D numpy array of dtype uint8.
    /// Strided views are copied first.
    fn decode_array(
        &mut self,
        encoding: &str,
        width: u32,
        height: u32,
        time_base: u64,
        events: &PyAny,
    ) -> PyResult<()> {
        let array = byte_array(events)?;
        let strided;
        let payload = match array.as_slice() {
            Ok(slice) => slice,
            Err(_) => {
                strided = collect_bytes(events)?;
                strided.as_slice()
            }
        };
        let params = DecodeParams::new(encoding, width, height, time_base);
        self.session
            .decode_packet(&params.packet(payload))
            .map_err(to_py_err)
    }

    /// Returns the decoded CD events and clears them. Call once per decode.
    ///
    /// Returns:
    ///     numpy.ndarray: structured array with fields 'x', 'y', 'p', 't'
    fn get_cd_events<'py>(&mut self, py: Python<'py>) -> &'py PyArray1<CdRecord> {
        cd_records(self.session.extract_cd_events()).into_pyarray(py)
    }

    /// Returns the decoded external trigger events and clears them.
    ///
    /// Returns:
    ///     numpy.ndarray: structured array with fields 'p', 't', 'id'
    fn get_ext_trig_events<'py>(&mut self, py: Python<'py>) -> &'py PyArray1<TriggerRecord> {
        trigger_records(self.session.extract_ext_trigger_events()).into_pyarray(py)
    }

    /// Returns the decoded CD events as a list of arrays, one per decoded
    /// packet, and clears them.
    fn get_cd_event_packets<'py>(&mut self, py: Python<'py>) -> &'py PyList {
        let events: &PyAny = self.get_cd_events(py);
        PyList::new(py, [events])
    }

    /// Returns the decoded trigger events as a list of arrays, one per
    /// decoded packet, and clears them.
    fn get_ext_trig_event_packets<'py>(&mut self, py: Python<'py>) -> &'py PyList {
        let events: &PyAny = self.get_ext_trig_events(py);
        PyList::new(py, [events])
    }

    /// Cumulative number of ON events.
    fn get_num_cd_on(&self) -> usize {
        self.session.cd_on_count()
    }

    /// Cumulative number of OFF events.
    fn get_num_cd_off(&self) -> usize {
        self.session.cd_off_count()
    }

    /// Cumulative number of rising edge external trigger events.
    fn get_num_trigger_rising(&self) -> usize {
        self.session.trigger_rising_count()
    }

    /// Cumulative number of falling edge external trigger events.
    fn get_num_trigger_falling(&self) -> usize {
        self.session.trigger_falling_count()
    }

    /// Names of the supported encodings.
    fn encodings(&self) -> Vec<String> {
        self.session
            .registry()
            .encodings()
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn __repr__(&self) -> String {
        let acc = self.session.accumulator();
        format!(
            "Decoder(sensor={}x{}, cd_on={}, cd_off={})",
            acc.width(),
            acc.height(),
            acc.cd_on_count(),
            acc.cd_off_count()
        )
    }
}

/// Event camera packet decoder module for Python.
#[pymodule]
fn _evcam(py: Python<'_>, m: &PyModule) -> PyResult<()> {
    dtype::register_dtypes(py)?;
    m.add("DecoderError", py.get_type::<DecoderError>())?;
    m.add_class::<Decoder>()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use evcam_core::codec::Evt3Encoder;
    use evcam_core::CdEvent;
    use numpy::{PyArray2, ToPyArray};
    use pyo3::types::{PyDict, PySlice};

    /// Runs `f` with the record dtypes registered. Skipped when numpy is
    /// not installed in the embedded interpreter.
    pub(crate) fn with_numpy(f: impl FnOnce(Python<'_>)) {
        Python::with_gil(|py| {
            if py.import("numpy").is_err() {
                eprintln!("numpy not available, skipping");
                return;
            }
            dtype::register_dtypes(py).unwrap();
            f(py)
        })
    }

    /// CD events at 100, 200 and 300us.
    fn payload() -> Vec<u8> {
        let mut encoder = Evt3Encoder::new();
        encoder.encode_cd(100, 1, 1, 1);
        encoder.encode_cd(200, 2, 1, 0);
        encoder.encode_cd(300, 3, 1, 1);
        encoder.finish()
    }

    fn message<'py>(py: Python<'py>, encoding: &str, events: &PyAny) -> &'py PyAny {
        let fields = PyDict::new(py);
        fields.set_item("encoding", encoding).unwrap();
        fields.set_item("width", 640).unwrap();
        fields.set_item("height", 480).unwrap();
        fields.set_item("time_base", 0).unwrap();
        fields.set_item("events", events).unwrap();
        py.import("types")
            .unwrap()
            .getattr("SimpleNamespace")
            .unwrap()
            .call((), Some(fields))
            .unwrap()
    }

    #[test]
    fn test_missing_field_is_attribute_error() {
        Python::with_gil(|py| {
            let msg = message(py, "evt3", PyBytes::new(py, &payload()));
            msg.delattr("time_base").unwrap();

            let mut decoder = Decoder::new();
            let err = decoder.decode(msg).unwrap_err();
            assert!(err.is_instance_of::<PyAttributeError>(py));
            assert!(err.to_string().contains("event packet has no time_base field"));
            assert_eq!(decoder.get_num_cd_on(), 0);
        });
    }

    #[test]
    fn test_unsupported_encoding_is_decoder_error() {
        Python::with_gil(|py| {
            let mut decoder = Decoder::new();
            let err = decoder
                .decode_bytes("bogus", 640, 480, 0, PyBytes::new(py, &payload()))
                .unwrap_err();
            assert!(err.is_instance_of::<DecoderError>(py));
        });
    }

    #[test]
    fn test_bytes_message() {
        Python::with_gil(|py| {
            let mut decoder = Decoder::new();
            let msg = message(py, "evt3", PyBytes::new(py, &payload()));
            decoder.decode(msg).unwrap();
            assert_eq!(decoder.get_num_cd_on(), 2);
            assert_eq!(decoder.get_num_cd_off(), 1);
        });
    }

    #[test]
    fn test_wrong_arrays_are_type_errors() {
        with_numpy(|py| {
            let mut decoder = Decoder::new();
            let square: &PyAny = PyArray2::<u8>::zeros(py, [2, 2], false);
            let floats: &PyAny = PyArray1::<f64>::zeros(py, 4, false);

            for array in [square, floats] {
                let err = decoder.decode_array("evt3", 640, 480, 0, array).unwrap_err();
                assert!(err.is_instance_of::<PyTypeError>(py));

                let err = decoder.decode(message(py, "evt3", array)).unwrap_err();
                assert!(err.is_instance_of::<PyTypeError>(py));
            }
            assert_eq!(decoder.get_num_cd_on(), 0);
        });
    }

    #[test]
    fn test_payload_kinds_decode_alike() {
        with_numpy(|py| {
            let payload = payload();
            let array: &PyAny = payload.to_pyarray(py);
            let list: &PyAny = PyList::new(py, &payload);

            // Every other byte of an interleaved array is the payload
            let interleaved: Vec<u8> = payload.iter().flat_map(|&b| [b, 0xFF]).collect();
            let interleaved = interleaved.to_pyarray(py);
            let strided = interleaved
                .call_method1(
                    "__getitem__",
                    (PySlice::new(py, 0, interleaved.len() as isize, 2),),
                )
                .unwrap();

            for events in [array, list, strided] {
                let mut decoder = Decoder::new();
                decoder.decode(message(py, "evt3", events)).unwrap();
                let cd = decoder.get_cd_events(py).readonly();
                let times: Vec<i64> = cd.as_slice().unwrap().iter().map(|r| r.0.t).collect();
                assert_eq!(times, vec![100, 200, 300]);
            }

            let mut decoder = Decoder::new();
            decoder.decode_array("evt3", 640, 480, 0, strided).unwrap();
            assert_eq!(decoder.get_num_cd_on(), 2);
        });
    }

    #[test]
    fn test_decode_until_resumes_over_a_list() {
        with_numpy(|py| {
            let list: &PyAny = PyList::new(py, &payload());
            let msg = message(py, "evt3", list);

            let mut decoder = Decoder::new();
            assert_eq!(decoder.decode_until(msg, 150).unwrap(), (true, 200));
            assert_eq!(decoder.get_cd_events(py).len(), 1);
            assert_eq!(decoder.decode_until(msg, 1_000).unwrap(), (false, 300));
            assert_eq!(decoder.get_cd_events(py).len(), 2);
            assert_eq!(decoder.get_num_cd_on() + decoder.get_num_cd_off(), 3);
        });
    }

    #[test]
    fn test_extracted_records() {
        with_numpy(|py| {
            let mut decoder = Decoder::new();
            decoder
                .decode_bytes("evt3", 640, 480, 0, PyBytes::new(py, &payload()))
                .unwrap();

            let cd = decoder.get_cd_events(py);
            assert_eq!(cd.readonly().as_slice().unwrap()[1].0, CdEvent::new(2, 1, 0, 200));
            assert_eq!(decoder.get_cd_events(py).len(), 0);
            assert_eq!(decoder.get_ext_trig_events(py).len(), 0);
        });
    }

    #[test]
    fn test_event_packet_lists() {
        with_numpy(|py| {
            let mut decoder = Decoder::new();
            decoder
                .decode_bytes("evt3", 640, 480, 0, PyBytes::new(py, &payload()))
                .unwrap();

            let packets = decoder.get_cd_event_packets(py);
            assert_eq!(packets.len(), 1);
            let first = packets.get_item(0).unwrap();
            assert_eq!(first.downcast::<PyArray1<CdRecord>>().unwrap().len(), 3);

            let packets = decoder.get_cd_event_packets(py);
            let again = packets.get_item(0).unwrap();
            assert_eq!(again.downcast::<PyArray1<CdRecord>>().unwrap().len(), 0);

            let triggers = decoder.get_ext_trig_event_packets(py);
            assert_eq!(triggers.len(), 1);
        });
    }
}

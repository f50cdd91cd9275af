use common::domain::{DomainError, Report};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tokio::io::AsyncBufRead;
use tracing::warn;

const REPORT_TAG: &[u8] = b"stuMessage";
const ESN_TAG: &[u8] = b"esn";
const PAYLOAD_TAG: &[u8] = b"payload";
const MESSAGE_ID_ATTR: &[u8] = b"messageID";

/// Streaming reader over an inbound feed document
///
/// Yields reports one at a time without buffering the document. The root
/// element's `messageID` attribute is captured on first encounter for the
/// acknowledgment. A malformed stream stops the sequence where it broke:
/// reports already yielded stay valid and `error()` records the reason.
pub struct StuStreamParser<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    message_id: Option<String>,
    root_seen: bool,
    open_elements: usize,
    error: Option<DomainError>,
    done: bool,
}

impl<R: AsyncBufRead + Unpin + Send> StuStreamParser<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            message_id: None,
            root_seen: false,
            open_elements: 0,
            error: None,
            done: false,
        }
    }

    /// Correlation identifier from the root element, if one was present
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Parse failure encountered mid-stream, if any
    pub fn error(&self) -> Option<&DomainError> {
        self.error.as_ref()
    }

    /// Next report in encounter order, or None once the stream is exhausted
    /// or broken
    pub async fn next_report(&mut self) -> Option<Report> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_event_into_async(&mut self.buf).await {
                Ok(Event::Start(start)) => {
                    if !self.root_seen {
                        self.root_seen = true;
                        Self::capture_message_id(&mut self.message_id, &start);
                    }
                    if start.local_name().as_ref() == REPORT_TAG {
                        // A report subtree is consumed whole, so it leaves
                        // the open-element count untouched
                        match self.read_report().await {
                            Ok(report) => return Some(report),
                            Err(err) => {
                                self.fail(err);
                                return None;
                            }
                        }
                    }
                    self.open_elements += 1;
                }
                Ok(Event::Empty(start)) => {
                    if !self.root_seen {
                        self.root_seen = true;
                        Self::capture_message_id(&mut self.message_id, &start);
                    }
                    if start.local_name().as_ref() == REPORT_TAG {
                        return Some(Report {
                            esn: String::new(),
                            payload: String::new(),
                        });
                    }
                }
                Ok(Event::End(_)) => {
                    self.open_elements = self.open_elements.saturating_sub(1);
                }
                Ok(Event::Eof) => {
                    if self.open_elements > 0 {
                        self.fail(DomainError::MalformedFeed(
                            "feed ended before the envelope closed".to_string(),
                        ));
                    } else {
                        self.done = true;
                    }
                    return None;
                }
                Ok(_) => {}
                Err(err) => {
                    self.fail(DomainError::MalformedFeed(err.to_string()));
                    return None;
                }
            }
        }
    }

    fn capture_message_id(message_id: &mut Option<String>, start: &BytesStart<'_>) {
        for attr in start.attributes().flatten() {
            if attr.key.local_name().as_ref() == MESSAGE_ID_ATTR {
                if let Ok(value) = attr.unescape_value() {
                    *message_id = Some(value.into_owned());
                }
            }
        }
    }

    /// Decode the children of one report element; the cursor is just past
    /// its start tag
    async fn read_report(&mut self) -> Result<Report, DomainError> {
        let mut esn = String::new();
        let mut payload = String::new();
        let mut field: Option<ReportField> = None;
        let mut depth = 0u32;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match self.reader.read_event_into_async(&mut buf).await {
                Ok(Event::Start(start)) => {
                    field = match start.local_name().as_ref() {
                        ESN_TAG if depth == 0 => Some(ReportField::Esn),
                        PAYLOAD_TAG if depth == 0 => Some(ReportField::Payload),
                        _ => None,
                    };
                    depth += 1;
                }
                Ok(Event::Text(text)) => {
                    let value = text
                        .unescape()
                        .map_err(|e| DomainError::MalformedFeed(e.to_string()))?;
                    match field {
                        Some(ReportField::Esn) => esn.push_str(&value),
                        Some(ReportField::Payload) => payload.push_str(&value),
                        None => {}
                    }
                }
                Ok(Event::CData(cdata)) => {
                    let value = String::from_utf8_lossy(&cdata).into_owned();
                    match field {
                        Some(ReportField::Esn) => esn.push_str(&value),
                        Some(ReportField::Payload) => payload.push_str(&value),
                        None => {}
                    }
                }
                Ok(Event::End(_)) => {
                    if depth == 0 {
                        return Ok(Report { esn, payload });
                    }
                    depth -= 1;
                    field = None;
                }
                Ok(Event::Eof) => {
                    return Err(DomainError::MalformedFeed(
                        "feed ended inside a report element".to_string(),
                    ));
                }
                Ok(_) => {}
                Err(err) => return Err(DomainError::MalformedFeed(err.to_string())),
            }
        }
    }

    fn fail(&mut self, err: DomainError) {
        warn!(error = %err, "telemetry feed parse failed, truncating stream");
        self.error = Some(err);
        self.done = true;
    }
}

enum ReportField {
    Esn,
    Payload,
}

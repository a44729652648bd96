use crate::error::FetchError;
use log::{debug, info};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One parsed reading of the device: `(key, raw value)` pairs in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    readings: Vec<(String, String)>,
}

impl Snapshot {
    /// Parses the `output.xml` document served by the Meetstekker. Every
    /// direct child of the root element is a measurement whose tag is the key
    /// and whose `value` attribute holds the raw value.
    pub fn from_xml(xml: &str) -> Result<Self, FetchError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut readings = Vec::new();
        let mut depth = 0usize;
        let mut seen_root = false;

        loop {
            match reader.read_event()? {
                Event::Start(element) => {
                    if depth == 0 {
                        if seen_root {
                            return Err(FetchError::Malformed(
                                "more than one root element".to_string(),
                            ));
                        }
                        seen_root = true;
                    } else if depth == 1 {
                        readings.push(reading(&reader, &element)?);
                    }
                    depth += 1;
                }
                Event::Empty(element) => {
                    if depth == 0 {
                        if seen_root {
                            return Err(FetchError::Malformed(
                                "more than one root element".to_string(),
                            ));
                        }
                        seen_root = true;
                    } else if depth == 1 {
                        readings.push(reading(&reader, &element)?);
                    }
                }
                Event::End(_) if depth == 0 => {
                    return Err(FetchError::Malformed("unexpected closing tag".to_string()));
                }
                Event::End(_) => depth -= 1,
                Event::Text(text) if depth == 0 => {
                    return Err(FetchError::Malformed(format!(
                        "unexpected text outside the root element: {:?}",
                        String::from_utf8_lossy(&text)
                    )));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(FetchError::Malformed("document has no root element".to_string()));
        }
        if depth != 0 {
            return Err(FetchError::Malformed("root element is not closed".to_string()));
        }
        Ok(Self { readings })
    }

    /// Raw value of `key`, if the device reported it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.readings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.readings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

fn reading(reader: &Reader<&[u8]>, element: &BytesStart) -> Result<(String, String), FetchError> {
    let key = reader
        .decoder()
        .decode(element.name().as_ref())?
        .into_owned();
    match element.try_get_attribute("value")? {
        Some(value) => Ok((key, value.unescape_value()?.into_owned())),
        None => Err(FetchError::MissingValue { key }),
    }
}

/// Anything that can produce a `Snapshot` once per cycle.
pub trait MeasurementSource {
    fn fetch(&mut self) -> Result<Snapshot, FetchError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkState {
    Unknown,
    Online,
    Offline,
}

/// HTTP client for the Aurum Meetstekker status page.
pub struct Meetstekker {
    url: String,
    client: reqwest::blocking::Client,
    state: NetworkState,
}

impl Meetstekker {
    /// The device sits on the local network, so system proxies are bypassed.
    pub fn new(host: &str) -> Result<Self, FetchError> {
        let url = format!("http://{host}/measurements/output.xml");
        let client = reqwest::blocking::Client::builder()
            .no_proxy()
            .build()
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;
        Ok(Self {
            url,
            client,
            state: NetworkState::Unknown,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    fn set_state(&mut self, new_state: NetworkState) {
        if self.state != new_state {
            self.state = new_state;
            info!("Meetstekker is {new_state:?}");
        }
    }

    fn request(&self) -> Result<String, FetchError> {
        let http_error = |source: reqwest::Error| FetchError::Http {
            url: self.url.clone(),
            source,
        };
        self.client
            .get(&self.url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(http_error)
    }
}

impl MeasurementSource for Meetstekker {
    fn fetch(&mut self) -> Result<Snapshot, FetchError> {
        let body = match self.request() {
            Ok(body) => body,
            Err(e) => {
                self.set_state(NetworkState::Offline);
                return Err(e);
            }
        };
        self.set_state(NetworkState::Online);

        let snapshot = Snapshot::from_xml(&body)?;
        debug!("fetched {} measurements from {}", snapshot.len(), self.url);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<measurements>
  <powerSolar value="123.4" />
  <smartMeterTimestamp value="231016143000S"></smartMeterTimestamp>
  <counterGas value="456" />
</measurements>"#;

    #[test]
    fn parses_children_in_document_order() {
        let snapshot = Snapshot::from_xml(OUTPUT_XML).unwrap();
        let pairs: Vec<_> = snapshot.iter().collect();
        assert_eq!(
            pairs,
            [
                ("powerSolar", "123.4"),
                ("smartMeterTimestamp", "231016143000S"),
                ("counterGas", "456"),
            ]
        );
        assert_eq!(snapshot.get("counterGas"), Some("456"));
        assert_eq!(snapshot.get("powerEV"), None);
    }

    #[test]
    fn ignores_grandchildren() {
        let snapshot =
            Snapshot::from_xml(r#"<m><powerMain value="1"><detail value="2"/></powerMain></m>"#)
                .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("detail"), None);
    }

    #[test]
    fn empty_root_gives_empty_snapshot() {
        assert!(Snapshot::from_xml("<measurements/>").unwrap().is_empty());
    }

    #[test]
    fn missing_value_attribute_fails() {
        let result = Snapshot::from_xml(r#"<m><powerSolar value="1"/><counterGas/></m>"#);
        assert!(matches!(
            result,
            Err(FetchError::MissingValue { key }) if key == "counterGas"
        ));
    }

    #[test]
    fn unclosed_root_fails() {
        assert!(Snapshot::from_xml(r#"<m><powerSolar value="1"/>"#).is_err());
    }

    #[test]
    fn mismatched_end_tag_fails() {
        assert!(Snapshot::from_xml(r#"<m><powerSolar value="1"></counterGas></m>"#).is_err());
    }

    #[test]
    fn non_xml_body_fails() {
        assert!(Snapshot::from_xml("502 Bad Gateway").is_err());
        assert!(Snapshot::from_xml("").is_err());
    }

    #[test]
    fn escaped_values_are_unescaped() {
        let snapshot = Snapshot::from_xml(r#"<m><smartMeterTimestamp value="a&amp;b"/></m>"#)
            .unwrap();
        assert_eq!(snapshot.get("smartMeterTimestamp"), Some("a&b"));
    }

    #[test]
    fn builds_status_page_url() {
        let meter = Meetstekker::new("192.168.0.110").unwrap();
        assert_eq!(meter.url(), "http://192.168.0.110/measurements/output.xml");
        assert_eq!(meter.state(), NetworkState::Unknown);
    }
}

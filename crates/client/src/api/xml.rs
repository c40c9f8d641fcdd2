//! XML attribute extraction for Nolij Web responses.
//!
//! The API reports results as flat XML elements whose payload lives
//! entirely in attributes; this module pulls those attribute maps out.

use nolijweb_domain::{AttributeMap, NolijError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Collect the attribute map of every `<name …>` element, in document order.
///
/// # Errors
/// Returns `NolijError::InvalidResponse` when the document is not
/// well-formed XML.
pub fn element_attributes(xml: &str, name: &str) -> Result<Vec<AttributeMap>> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element))
                if element.name().as_ref() == name.as_bytes() =>
            {
                let mut attrs = AttributeMap::new();
                for attr in element.attributes() {
                    let attr = attr.map_err(|e| {
                        NolijError::InvalidResponse(format!("malformed XML attribute: {e}"))
                    })?;
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = attr
                        .unescape_value()
                        .map_err(|e| {
                            NolijError::InvalidResponse(format!(
                                "malformed XML attribute value: {e}"
                            ))
                        })?
                        .into_owned();
                    attrs.insert(key, value);
                }
                out.push(attrs);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(NolijError::InvalidResponse(format!("malformed XML: {e}"))),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_attributes_of_each_matching_element() {
        let xml = r#"<folderobjects>
            <folderobject name="a.pdf" documentid="1"/>
            <folderobject name="b.pdf" documentid="2"/>
        </folderobjects>"#;

        let objects = element_attributes(xml, "folderobject").expect("parsed");
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].get("name").map(String::as_str), Some("a.pdf"));
        assert_eq!(objects[1].get("documentid").map(String::as_str), Some("2"));
    }

    #[test]
    fn matches_start_elements_with_children() {
        let xml = r#"<documentmeta documentid="8" pages="1"><pagemeta page="1"/></documentmeta>"#;

        let metas = element_attributes(xml, "documentmeta").expect("parsed");
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].get("documentid").map(String::as_str), Some("8"));

        let pages = element_attributes(xml, "pagemeta").expect("parsed");
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn unescapes_attribute_values() {
        let xml = r#"<version name="Nolij &amp; Co"/>"#;
        let versions = element_attributes(xml, "version").expect("parsed");
        assert_eq!(versions[0].get("name").map(String::as_str), Some("Nolij & Co"));
    }

    #[test]
    fn returns_empty_for_absent_elements() {
        let xml = "<folderobjects></folderobjects>";
        let objects = element_attributes(xml, "folderobject").expect("parsed");
        assert!(objects.is_empty());
    }

    #[test]
    fn malformed_xml_is_an_invalid_response() {
        let err = element_attributes("<unclosed", "unclosed").unwrap_err();
        assert!(matches!(err, NolijError::InvalidResponse(_)));
    }
}

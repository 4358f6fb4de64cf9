//! Extraction from CRX Package Manager service.jsp responses
//!
//! The package manager replies with small fixed-shape XML documents. Note
//! that AEM reports install failures with HTTP 200 and a non-200 code in
//! the XML `<status>` element, so the XML code is the one that counts.

use regex::Regex;

/// The `code` attribute of the `<status>` element, when present.
pub fn status_code(xml: &str) -> Option<String> {
    let re = Regex::new(r#"<status[^>]*\bcode\s*=\s*"(\d+)""#).expect("status pattern is valid");
    re.captures(xml).map(|c| c[1].to_string())
}

/// True when the XML status code is 200.
pub fn status_ok(xml: &str) -> bool {
    status_code(xml).as_deref() == Some("200")
}

/// Text content of every `<tag>` element in document order.
pub fn element_texts(xml: &str, tag: &str) -> Vec<String> {
    let re = Regex::new(&format!(r"<{tag}>([^<]*)</{tag}>")).expect("tag pattern is valid");
    re.captures_iter(xml).map(|c| c[1].to_string()).collect()
}

/// Whether a `cmd=ls` listing contains the package, by exact match against
/// any package `name` or `downloadName`.
pub fn package_listed(xml: &str, pkg_name: &str) -> bool {
    element_texts(xml, "name")
        .iter()
        .chain(element_texts(xml, "downloadName").iter())
        .any(|listed| listed == pkg_name)
}

/// The `name` AEM assigned to a freshly uploaded package.
pub fn uploaded_package_name(xml: &str) -> Option<String> {
    element_texts(xml, "name").into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LS_RESPONSE: &str = r#"<crx version="1.0"><response>
<status code="200">ok</status>
<data><packages>
<package><group>my_packages</group><name>test-all</name><downloadName>test-all-2.2-SNAPSHOT.zip</downloadName></package>
<package><group>adobe</group><name>core-bundle</name><downloadName>core-bundle-1.0.zip</downloadName></package>
</packages></data>
</response></crx>"#;

    const INSTALL_FAILURE: &str = r#"<crx version="1.0"><response>
<status code="500">unresolved dependencies</status>
</response></crx>"#;

    #[test]
    fn extracts_status_code() {
        assert_eq!(status_code(LS_RESPONSE).as_deref(), Some("200"));
        assert!(status_ok(LS_RESPONSE));
        assert_eq!(status_code(INSTALL_FAILURE).as_deref(), Some("500"));
        assert!(!status_ok(INSTALL_FAILURE));
        assert_eq!(status_code("<response/>"), None);
    }

    #[test]
    fn lists_package_names_and_download_names() {
        assert_eq!(element_texts(LS_RESPONSE, "name"), vec!["test-all", "core-bundle"]);
        assert!(package_listed(LS_RESPONSE, "test-all"));
        assert!(package_listed(LS_RESPONSE, "core-bundle-1.0.zip"));
        assert!(!package_listed(LS_RESPONSE, "test"));
    }

    #[test]
    fn reads_uploaded_name_from_upload_response() {
        let upload = r#"<crx><response><status code="200">ok</status>
<data><package><group>my_packages</group><name>test-all</name></package></data>
</response></crx>"#;
        assert_eq!(uploaded_package_name(upload).as_deref(), Some("test-all"));
    }
}

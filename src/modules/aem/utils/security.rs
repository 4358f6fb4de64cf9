//! Granite security helpers shared by the user, group and password modules

use crate::modules::aem::utils::client::AemClient;
use crate::modules::error::ModuleExecutionError;

/// Querybuilder search for an authorizable by rep:authorizableId.
pub fn authorizable_query(root: &str, id: &str) -> String {
    format!(
        "/bin/querybuilder.json?path={root}&1_property=rep:authorizableId\
         &1_property.value={id}&p.limit=-1&p.hits=full"
    )
}

/// Resolve an authorizable's JCR path, or None when it does not exist.
pub async fn find_authorizable_path(
    client: &AemClient,
    root: &str,
    id: &str,
) -> Result<Option<String>, ModuleExecutionError> {
    let response = client.get(&authorizable_query(root, id)).await?;
    if !response.is_success() {
        return Err(ModuleExecutionError::failed(format!(
            "Error searching for '{id}'. status={} output={}",
            response.status, response.content
        )));
    }
    let info = response.json()?;
    let hits = info
        .get("hits")
        .and_then(|h| h.as_array())
        .ok_or_else(|| {
            ModuleExecutionError::failed(format!("no hits field in querybuilder response for {id}"))
        })?;
    Ok(hits
        .first()
        .and_then(|hit| hit.get("jcr:path"))
        .and_then(|p| p.as_str())
        .map(|p| p.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_targets_the_requested_tree() {
        let query = authorizable_query("/home/users", "bbaggins");
        assert!(query.starts_with("/bin/querybuilder.json?path=/home/users"));
        assert!(query.contains("1_property.value=bbaggins"));
        assert!(query.contains("p.hits=full"));
    }
}

//! Tag report export
//!
//! One row per resource: type label, identifier, then the value of each
//! required key (blank when absent). Rendered as RFC 4180 CSV.

use crate::audit::ResourceFinding;
use crate::error::GovernanceError;
use crate::gateway::ResourceGateway;
use crate::policy::RequiredTagPolicy;
use crate::resource::{Resource, ResourceId, ResourceKind};
use crate::tags::TagSet;
use std::path::Path;

/// Default output file name
pub const DEFAULT_REPORT_PATH: &str = "tag_report.csv";

/// Fixed leading columns
pub const REPORT_COLUMNS: [&str; 2] = ["ResourceType", "ResourceId"];

/// One resource in the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    /// Resource type
    pub kind: ResourceKind,
    /// Resource identifier
    pub resource_id: ResourceId,
    /// Value per policy key, in policy order; empty when absent
    pub values: Vec<String>,
}

impl ReportRow {
    /// Project `tags` onto the policy keys
    #[must_use]
    pub fn from_tags(
        kind: ResourceKind,
        resource_id: ResourceId,
        tags: &TagSet,
        policy: &RequiredTagPolicy,
    ) -> Self {
        let values = policy
            .keys()
            .map(|key| tags.get(key).unwrap_or_default().to_string())
            .collect();
        Self {
            kind,
            resource_id,
            values,
        }
    }
}

/// Tag report over one or more resource types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReport {
    columns: Vec<String>,
    rows: Vec<ReportRow>,
}

impl TagReport {
    /// Create empty report with one column per policy key
    #[must_use]
    pub fn new(policy: &RequiredTagPolicy) -> Self {
        let columns = REPORT_COLUMNS
            .iter()
            .map(|c| (*c).to_string())
            .chain(policy.keys().map(ToString::to_string))
            .collect();
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build from audit findings, using the tags each resource carries
    /// after remediation
    #[must_use]
    pub fn from_findings<'f>(
        findings: impl IntoIterator<Item = &'f ResourceFinding>,
        policy: &RequiredTagPolicy,
    ) -> Self {
        let mut report = Self::new(policy);
        for finding in findings {
            report.rows.push(ReportRow::from_tags(
                finding.kind,
                finding.resource_id.clone(),
                &finding.effective_tags(),
                policy,
            ));
        }
        report
    }

    /// Append a row for every resource of type `R`
    ///
    /// Resources whose tags cannot be read are logged and left out.
    ///
    /// # Errors
    /// Returns the gateway error if the listing fails.
    pub async fn collect<R: Resource>(
        &mut self,
        gateway: &dyn ResourceGateway,
        policy: &RequiredTagPolicy,
    ) -> Result<usize, GovernanceError> {
        let resources = R::list(gateway).await?;
        let before = self.rows.len();
        for resource in &resources {
            match resource.read_tags(gateway).await {
                Ok(tags) => self.rows.push(ReportRow::from_tags(
                    R::KIND,
                    resource.id().clone(),
                    &tags,
                    policy,
                )),
                Err(e) => tracing::warn!(
                    resource_type = %R::KIND,
                    resource_id = %resource.id(),
                    error = %e,
                    "{} {}: could not read tags: {e}",
                    R::KIND,
                    resource.id()
                ),
            }
        }
        Ok(self.rows.len() - before)
    }

    /// Rows in insertion order
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Header columns
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Render as CSV with a header line
    #[must_use]
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_record(&mut out, self.columns.iter().map(String::as_str));
        for row in &self.rows {
            push_record(
                &mut out,
                [row.kind.label(), row.resource_id.as_str()]
                    .into_iter()
                    .chain(row.values.iter().map(String::as_str)),
            );
        }
        out
    }

    /// Write CSV to `path` and return the number of records written
    ///
    /// # Errors
    /// Returns [`GovernanceError::Io`] if the file cannot be written.
    pub fn write_csv(&self, path: &Path) -> Result<usize, GovernanceError> {
        std::fs::write(path, self.to_csv())?;
        tracing::info!(
            path = %path.display(),
            records = self.rows.len(),
            "exported {} records to {}",
            self.rows.len(),
            path.display()
        );
        Ok(self.rows.len())
    }
}

fn push_record<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push_str("\r\n");
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_for_absent_keys() {
        let row = ReportRow::from_tags(
            ResourceKind::ComputeInstance,
            ResourceId::from("i-1"),
            &TagSet::new().with("Owner", "alice").with("Team", "x"),
            &RequiredTagPolicy::default(),
        );
        assert_eq!(row.values, vec!["alice", "", ""]);
    }

    #[test]
    fn csv_header_and_rows() {
        let policy = RequiredTagPolicy::default();
        let mut report = TagReport::new(&policy);
        report.rows.push(ReportRow::from_tags(
            ResourceKind::ObjectBucket,
            ResourceId::from("logs"),
            &TagSet::new().with("Environment", "prod"),
            &policy,
        ));
        assert_eq!(
            report.to_csv(),
            "ResourceType,ResourceId,Owner,Environment,CostCenter\r\nS3,logs,,prod,\r\n"
        );
    }

    #[test]
    fn csv_quotes_special_fields() {
        let mut out = String::new();
        push_record(&mut out, ["plain", "a,b", "say \"hi\"", "two\nlines"]);
        assert_eq!(out, "plain,\"a,b\",\"say \"\"hi\"\"\",\"two\nlines\"\r\n");
    }
}

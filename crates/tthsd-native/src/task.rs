//! Task descriptors and the JSON task array handed to the engine.

use std::ffi::{CStr, CString, c_int};

use serde::Serialize;
use uuid::Uuid;

use crate::error::{BindingError, BindingResult};

/// One download as the engine receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDescriptor {
    /// Source URL.
    pub url: String,
    /// Destination file path.
    pub save_path: String,
    /// Display name echoed back in events.
    pub show_name: String,
    /// Identifier echoed back in events.
    pub id: String,
}

impl TaskDescriptor {
    fn contains_nul(&self) -> bool {
        [&self.url, &self.save_path, &self.show_name, &self.id]
            .iter()
            .any(|field| field.contains('\0'))
    }
}

const fn nul_in_fields() -> BindingError {
    BindingError::InvalidTaskBatch {
        reason: "task fields must not contain NUL bytes",
    }
}

/// Serialized task array ready for a creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskBatch {
    descriptors: Vec<TaskDescriptor>,
    json: CString,
    count: c_int,
}

impl TaskBatch {
    /// Descriptors in submission order.
    #[must_use]
    pub fn descriptors(&self) -> &[TaskDescriptor] {
        &self.descriptors
    }

    /// The JSON array as a C string.
    #[must_use]
    pub fn as_c_str(&self) -> &CStr {
        &self.json
    }

    /// Number of tasks as the engine's integer type.
    #[must_use]
    pub const fn count(&self) -> c_int {
        self.count
    }

    /// Whether the batch holds no task.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Serialize already-built descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::InvalidTaskBatch`] when the count does not fit a C
    /// `int` or a field contains a NUL byte.
    pub fn from_descriptors(descriptors: Vec<TaskDescriptor>) -> BindingResult<Self> {
        if descriptors.iter().any(TaskDescriptor::contains_nul) {
            return Err(nul_in_fields());
        }
        let count = c_int::try_from(descriptors.len()).map_err(|_| {
            BindingError::InvalidTaskBatch {
                reason: "task count exceeds engine integer range",
            }
        })?;
        let json = serde_json::to_string(&descriptors).map_err(|_| {
            BindingError::InvalidTaskBatch {
                reason: "task array could not be serialized",
            }
        })?;
        let json = CString::new(json).map_err(|_| nul_in_fields())?;
        Ok(Self {
            descriptors,
            json,
            count,
        })
    }
}

/// Zip URL and save-path lists into a [`TaskBatch`].
///
/// `show_names` and `ids` may be shorter than `urls`; missing or absent entries fall
/// back to the URL's last path segment and a fresh UUID respectively. Each list
/// has its own element type, so owned and borrowed strings can be mixed; an absent
/// list needs its type spelled out, as in `None::<&[&str]>`.
///
/// # Errors
///
/// Returns [`BindingError::TaskCountMismatch`] when `urls` and `save_paths` differ
/// in length, otherwise the errors of [`TaskBatch::from_descriptors`].
pub fn build_tasks<U, P, N, I>(
    urls: &[U],
    save_paths: &[P],
    show_names: Option<&[N]>,
    ids: Option<&[I]>,
) -> BindingResult<TaskBatch>
where
    U: AsRef<str>,
    P: AsRef<str>,
    N: AsRef<str>,
    I: AsRef<str>,
{
    if urls.len() != save_paths.len() {
        return Err(BindingError::TaskCountMismatch {
            urls: urls.len(),
            save_paths: save_paths.len(),
        });
    }

    let descriptors = urls
        .iter()
        .zip(save_paths)
        .enumerate()
        .map(|(index, (url, save_path))| {
            let url = url.as_ref();
            let show_name = show_names
                .and_then(|names| names.get(index))
                .map_or_else(|| default_show_name(url, index), |name| name.as_ref().to_owned());
            let id = ids
                .and_then(|ids| ids.get(index))
                .map_or_else(|| Uuid::new_v4().to_string(), |id| id.as_ref().to_owned());
            TaskDescriptor {
                url: url.to_owned(),
                save_path: save_path.as_ref().to_owned(),
                show_name,
                id,
            }
        })
        .collect();

    TaskBatch::from_descriptors(descriptors)
}

/// Last path segment of `url` without query or fragment, or `task_{index}`.
#[must_use]
pub fn default_show_name(url: &str, index: usize) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    if segment.is_empty() {
        format!("task_{index}")
    } else {
        segment.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const NO_NAMES: Option<&[&str]> = None;
    const NO_IDS: Option<&[&str]> = None;

    #[test]
    fn two_pairs_produce_two_descriptors_with_defaults() {
        let batch = build_tasks(&["u1", "u2"], &["p1", "p2"], NO_NAMES, NO_IDS).expect("batch");
        let descriptors = batch.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(batch.count(), 2);
        assert_eq!(descriptors[0].url, "u1");
        assert_eq!(descriptors[0].save_path, "p1");
        assert_eq!(descriptors[0].show_name, "u1");
        assert_eq!(descriptors[1].url, "u2");
        assert_eq!(descriptors[1].show_name, "u2");
        assert!(descriptors.iter().all(|task| !task.id.is_empty()));
        assert_ne!(descriptors[0].id, descriptors[1].id);
    }

    #[test]
    fn generated_ids_are_unique_across_a_batch() {
        let urls: Vec<String> = (0..64).map(|i| format!("https://h/f{i}.bin")).collect();
        let paths: Vec<String> = (0..64).map(|i| format!("/tmp/f{i}.bin")).collect();
        let batch = build_tasks(&urls, &paths, NO_NAMES, NO_IDS).expect("batch");
        let ids: HashSet<&str> = batch.descriptors().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn unequal_lengths_fail_before_building() {
        let err = build_tasks(&["u1", "u2"], &["p1"], NO_NAMES, NO_IDS).expect_err("mismatch");
        assert!(matches!(
            err,
            BindingError::TaskCountMismatch {
                urls: 2,
                save_paths: 1
            }
        ));
        let err = build_tasks::<&str, _, &str, &str>(&[], &["p1"], None, None)
            .expect_err("mismatch");
        assert!(matches!(err, BindingError::TaskCountMismatch { .. }));
    }

    #[test]
    fn short_name_and_id_lists_fall_back_per_position() {
        let batch = build_tasks(
            &["https://h/a.zip", "https://h/dir/b.iso?sig=1"],
            &["/d/a.zip", "/d/b.iso"],
            Some(&["Alpha"][..]),
            Some(&["id-a"][..]),
        )
        .expect("batch");
        let tasks = batch.descriptors();
        assert_eq!(tasks[0].show_name, "Alpha");
        assert_eq!(tasks[0].id, "id-a");
        assert_eq!(tasks[1].show_name, "b.iso");
        assert_eq!(
            Uuid::parse_str(&tasks[1].id)
                .ok()
                .map(|id| id.get_version_num()),
            Some(4)
        );
    }

    #[test]
    fn owned_and_borrowed_lists_mix() {
        let urls = vec!["https://h/a.bin".to_string(), "https://h/b.bin".to_string()];
        let names = ["first"];
        let ids = vec![String::from("id-a"), String::from("id-b")];
        let batch = build_tasks(
            &urls,
            &["/d/a.bin", "/d/b.bin"],
            Some(&names[..]),
            Some(&ids[..]),
        )
        .expect("batch");
        let tasks = batch.descriptors();
        assert_eq!(tasks[0].show_name, "first");
        assert_eq!(tasks[1].show_name, "b.bin");
        assert_eq!(tasks[1].id, "id-b");
        assert_eq!(tasks[1].save_path, "/d/b.bin");
    }

    #[test]
    fn show_name_falls_back_to_index_for_empty_segment() {
        assert_eq!(default_show_name("https://host/dir/", 3), "task_3");
        assert_eq!(default_show_name("https://host/file.bin#frag", 0), "file.bin");
        assert_eq!(default_show_name("", 1), "task_1");
    }

    #[test]
    fn wire_format_is_an_array_of_four_string_fields() {
        let batch = build_tasks(&["u"], &["p"], Some(&["n"][..]), Some(&["i"][..])).expect("batch");
        let value: serde_json::Value =
            serde_json::from_slice(batch.as_c_str().to_bytes()).expect("json");
        assert_eq!(
            value,
            serde_json::json!([{ "url": "u", "save_path": "p", "show_name": "n", "id": "i" }])
        );
    }

    #[test]
    fn nul_bytes_are_rejected() {
        let err = build_tasks(&["u\0"], &["p"], NO_NAMES, NO_IDS).expect_err("nul");
        assert!(matches!(
            err,
            BindingError::InvalidTaskBatch {
                reason: "task fields must not contain NUL bytes"
            }
        ));
    }
}

// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use work_manager_core::{Task, TaskError};

pub type WordCounts = BTreeMap<String, u64>;

/// Counts, for one chunk of text, how many strings contain each target word
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordCountTask {
    pub chunk_id: usize,
    pub data: Vec<String>,
    pub targets: Vec<String>,
}

impl Task for WordCountTask {
    type Output = WordCounts;

    fn run(self) -> Result<WordCounts, TaskError> {
        if self.targets.iter().any(String::is_empty) {
            return Err(TaskError::failed(format!(
                "chunk {} has an empty target word",
                self.chunk_id
            )));
        }

        let mut counts: WordCounts = self.targets.iter().map(|t| (t.clone(), 0)).collect();
        for text in &self.data {
            for target in &self.targets {
                if text.contains(target.as_str()) {
                    if let Some(count) = counts.get_mut(target) {
                        *count += 1;
                    }
                }
            }
        }
        Ok(counts)
    }
}

pub fn generate_random_string(rng: &mut impl Rng, max_length: usize) -> String {
    let length = rng.random_range(1..=max_length);
    (0..length)
        .map(|_| rng.random_range(b'a'..=b'z') as char)
        .collect()
}

pub fn generate_target_word(rng: &mut impl Rng, length: usize) -> String {
    (0..length)
        .map(|_| rng.random_range(b'a'..=b'z') as char)
        .collect()
}

/// Splits `data` into tasks of at most `partition_size` strings
pub fn partition(
    data: &[String],
    targets: &[String],
    partition_size: usize,
) -> Vec<WordCountTask> {
    data.chunks(partition_size.max(1))
        .enumerate()
        .map(|(chunk_id, chunk)| WordCountTask {
            chunk_id,
            data: chunk.to_vec(),
            targets: targets.to_vec(),
        })
        .collect()
}

pub fn merge(total: &mut WordCounts, partial: &WordCounts) {
    for (word, count) in partial {
        *total.entry(word.clone()).or_insert(0) += count;
    }
}

/// Words ordered by descending count, ties broken alphabetically
pub fn ranked(counts: &WordCounts) -> Vec<(&str, u64)> {
    let mut ranked: Vec<_> = counts.iter().map(|(w, c)| (w.as_str(), *c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use work_manager_core::execute;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_counts_strings_containing_target() {
        let task = WordCountTask {
            chunk_id: 0,
            data: strings(&["abcabc", "xyz", "zabz", "q"]),
            targets: strings(&["ab", "z", "nope"]),
        };
        let counts = execute(task).unwrap();
        assert_eq!(counts["ab"], 2);
        assert_eq!(counts["z"], 2);
        assert_eq!(counts["nope"], 0);
    }

    #[test]
    fn test_empty_target_fails() {
        let task = WordCountTask {
            chunk_id: 4,
            data: strings(&["a"]),
            targets: strings(&[""]),
        };
        assert!(matches!(execute(task), Err(TaskError::Failed(_))));
    }

    #[test]
    fn test_partition_covers_all_data() {
        let data = strings(&["a", "b", "c", "d", "e"]);
        let tasks = partition(&data, &strings(&["a"]), 2);
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[2].chunk_id, 2);
        assert_eq!(tasks[2].data, strings(&["e"]));
    }

    #[test]
    fn test_merge_and_rank() {
        let mut total = WordCounts::new();
        merge(&mut total, &[("b".to_string(), 2), ("a".to_string(), 1)].into());
        merge(&mut total, &[("a".to_string(), 1), ("c".to_string(), 5)].into());
        assert_eq!(ranked(&total), vec![("c", 5), ("a", 2), ("b", 2)]);
    }

    #[test]
    fn test_generated_words_are_lowercase() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let word = generate_random_string(&mut rng, 8);
            assert!((1..=8).contains(&word.len()));
            assert!(word.bytes().all(|b| b.is_ascii_lowercase()));
        }
        assert_eq!(generate_target_word(&mut rng, 3).len(), 3);
    }
}

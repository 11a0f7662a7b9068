//! Training history and model checkpointing.
use std::path::{Path, PathBuf};

use crate::errors::Error;
use crate::models::Network;
use crate::tensor::*;

/// Losses and metrics computed at the end of an epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRecord {
    pub epoch: u64,
    pub train_loss: PrimitiveType,
    pub train_metrics: Vec<PrimitiveType>,
    pub valid_loss: Option<PrimitiveType>,
    pub valid_metrics: Vec<PrimitiveType>,
}

/// Records of every epoch of a training run.
#[derive(Debug, Clone, Default)]
pub struct History {
    metric_names: Vec<String>,
    records: Vec<EpochRecord>,
}

impl History {
    pub fn new(metric_names: Vec<String>) -> History {
        History {
            metric_names,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    /// Returns the lowest validation loss, if any epoch was validated.
    pub fn best_valid_loss(&self) -> Option<PrimitiveType> {
        self.records.iter()
            .filter_map(|record| record.valid_loss)
            .fold(None, |best, loss| match best {
                Some(best) if best <= loss => Some(best),
                _ => Some(loss),
            })
    }

    /// Writes one row per epoch in a CSV file.
    ///
    /// The columns are the epoch, the training loss, the training metrics, the validation loss and
    /// the validation metrics. Missing validation values are left empty.
    pub fn save_csv(&self, path: &Path) -> Result<(), Error> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["epoch".to_string(), "loss".to_string()];
        header.extend(self.metric_names.iter().cloned());
        header.push("val_loss".to_string());
        header.extend(self.metric_names.iter().map(|name| format!("val_{}", name)));
        writer.write_record(&header)?;

        for record in &self.records {
            let mut row = vec![record.epoch.to_string(), record.train_loss.to_string()];
            row.extend(record.train_metrics.iter().map(|value| value.to_string()));
            row.push(record.valid_loss.map(|loss| loss.to_string()).unwrap_or_default());
            for i in 0..self.metric_names.len() {
                row.push(record.valid_metrics.get(i).map(|value| value.to_string()).unwrap_or_default());
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}


/// Saves the network whenever the validation loss reaches a new minimum.
pub struct Checkpoint {
    path: PathBuf,
    best: Option<PrimitiveType>,
}

impl Checkpoint {
    pub fn new(path: &Path) -> Checkpoint {
        Checkpoint {
            path: path.to_path_buf(),
            best: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn best(&self) -> Option<PrimitiveType> {
        self.best
    }

    /// Returns true if the network has been saved.
    ///
    /// Epochs without validation loss never trigger a save.
    pub(crate) fn update(&mut self, network: &Network, record: &EpochRecord) -> Result<bool, Error> {
        match record.valid_loss {
            Some(loss) if self.is_improvement(loss) => {
                network.save(&self.path)?;
                self.best = Some(loss);
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    fn is_improvement(&self, loss: PrimitiveType) -> bool {
        match self.best {
            Some(best) => loss < best,
            None => loss.is_finite(),
        }
    }
}


#[cfg(test)]
mod tests {
    use std::fs;
    use crate::callbacks::*;

    fn record(epoch: u64, valid_loss: Option<f32>) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss: 0.5,
            train_metrics: vec![0.75],
            valid_loss,
            valid_metrics: valid_loss.map(|_| vec![0.5]).unwrap_or_default(),
        }
    }

    #[test]
    fn test_best_valid_loss() {
        let mut history = History::new(vec!["accuracy".to_string()]);
        assert_eq!(history.best_valid_loss(), None);
        history.push(record(1, Some(0.4)));
        history.push(record(2, Some(0.3)));
        history.push(record(3, None));
        history.push(record(4, Some(0.35)));
        assert_eq!(history.best_valid_loss(), Some(0.3));
        assert_eq!(history.records().len(), 4);
    }

    #[test]
    fn test_save_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let mut history = History::new(vec!["accuracy".to_string()]);
        history.push(record(1, Some(0.25)));
        history.push(record(2, None));
        history.save_csv(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "epoch,loss,accuracy,val_loss,val_accuracy");
        assert_eq!(lines[1], "1,0.5,0.75,0.25,0.5");
        assert_eq!(lines[2], "2,0.5,0.75,,");
    }

    #[test]
    fn test_checkpoint_improvement() {
        let mut checkpoint = Checkpoint::new(std::path::Path::new("model.h5"));
        assert!(checkpoint.is_improvement(0.7));
        checkpoint.best = Some(0.5);
        assert!(!checkpoint.is_improvement(0.5));
        assert!(checkpoint.is_improvement(0.4));
        assert!(!checkpoint.is_improvement(f32::NAN));
    }
}

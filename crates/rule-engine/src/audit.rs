//! 文件审计日志
//!
//! 以 JSON Lines 追加写入事实插入与规则触发记录。日志句柄与会话中注册的监听器
//! 共享同一个写入端，句柄关闭后监听器不再写入。
//!
//! 每条记录连同换行符一次 `write_all` 写入追加模式的文件，多个会话同时写同一路径时
//! 行与行之间不会交错。

use crate::api::{ActivationEvent, AgendaEventListener, AuditLogger, ObjectInsertedEvent};
use crate::error::Result;
use crate::fact::FactHandle;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// 单条审计记录
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum AuditRecord<'a> {
    ObjectInserted {
        handle: FactHandle,
        kind: &'a str,
        data: &'a Value,
        inserted_by: Option<&'a str>,
        at: DateTime<Utc>,
    },
    ActivationFired {
        rule_id: &'a str,
        rule_name: &'a str,
        sequence: u64,
        handles: &'a [FactHandle],
        at: DateTime<Utc>,
    },
}

struct AuditTrail {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl AuditTrail {
    fn write(&self, record: &AuditRecord<'_>) {
        let mut guard = self.file.lock();
        let Some(file) = guard.as_mut() else {
            return;
        };

        let written = serde_json::to_vec(record)
            .map_err(std::io::Error::from)
            .and_then(|mut line| {
                line.push(b'\n');
                file.write_all(&line)
            });
        if let Err(e) = written {
            warn!(path = %self.path.display(), error = %e, "审计记录写入失败");
        }
    }

    fn close(&self) -> Result<()> {
        if let Some(file) = self.file.lock().take() {
            file.sync_data()?;
            debug!(path = %self.path.display(), "审计日志已关闭");
        }
        Ok(())
    }
}

impl AgendaEventListener for AuditTrail {
    fn after_activation_fired(&self, event: &ActivationEvent) {
        self.write(&AuditRecord::ActivationFired {
            rule_id: &event.rule_id,
            rule_name: &event.rule_name,
            sequence: event.sequence,
            handles: &event.handles,
            at: event.fired_at,
        });
    }

    fn object_inserted(&self, event: &ObjectInsertedEvent) {
        self.write(&AuditRecord::ObjectInserted {
            handle: event.handle,
            kind: event.fact.kind(),
            data: event.fact.data(),
            inserted_by: event.inserted_by.as_deref(),
            at: Utc::now(),
        });
    }
}

/// 写往本地文件的审计日志
pub struct FileAuditLogger {
    trail: Arc<AuditTrail>,
}

impl FileAuditLogger {
    /// 以追加模式打开目标文件，父目录不存在时自动创建
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!(path = %path.display(), "审计日志已打开");

        Ok(Self {
            trail: Arc::new(AuditTrail {
                path: path.to_path_buf(),
                file: Mutex::new(Some(file)),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.trail.path
    }

    /// 写入同一文件的议程监听器
    pub fn listener(&self) -> Arc<dyn AgendaEventListener> {
        self.trail.clone()
    }
}

impl AuditLogger for FileAuditLogger {
    fn close(&mut self) -> Result<()> {
        self.trail.close()
    }
}

impl Drop for FileAuditLogger {
    fn drop(&mut self) {
        if let Err(e) = self.trail.close() {
            warn!(path = %self.trail.path.display(), error = %e, "审计日志关闭失败");
        }
    }
}

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::writer::{MakeWriter, OptionalWriter};

use crate::files::{LoggingFile, DEFAULT_SUFFIX};

/// 既定のバックアップ数。
pub const DEFAULT_BACKUP_COUNT: u16 = 14;

/// 既定の最低ログレベル。
pub const DEFAULT_LEVEL: Level = Level::INFO;

/// 日付毎にログファイルを切り替えるアペンダー。
///
/// `TRFAppender`は、`tracing-subscriber`クレートの`MakeWriter`を実装しており、
/// ログの書き込み先としてフォーマッタに渡すことができる。
///
/// 記録するとき、現在時刻に対応するファイル名を計算して、使用中のファイル名と
/// 異なる場合、新しいファイルに切り替える。時刻に対応するファイルがディスクに
/// 存在しない場合、切り替える前に、バックアップ数を超過した古いファイルを削除する。
///
/// ファイルへの書き込みは、排他的なアドバイザリロックを取得して行う。
pub struct TRFAppender {
    files: LoggingFile,
    level: Level,
    writer: RwLock<ActiveFile>,
}

/// 使用中のログファイルとそのパス。
#[derive(Debug)]
struct ActiveFile {
    path: PathBuf,
    file: File,
}

#[derive(Debug)]
pub struct RollingWriter<'a>(RwLockReadGuard<'a, ActiveFile>);

impl TRFAppender {
    /// `TRFAppender`を作成する。
    ///
    /// # Arguments
    ///
    /// * directory: ファイルを作成するディレクトリ。
    /// * suffix: ファイル名の時刻フォーマット。
    /// * backup_count: 残す最大ファイル数。
    /// * level: 記録する最低ログレベル。
    ///
    /// # Returns
    ///
    /// `TRFAppender`インスタンス。
    pub fn new(
        directory: impl AsRef<Path>,
        suffix: &str,
        backup_count: u16,
        level: Level,
    ) -> TRFAppender {
        TRFAppender::builder(directory)
            .suffix(suffix)
            .backup_count(backup_count)
            .level(level)
            .build()
            .expect("failed to create appender")
    }

    /// `TRFAppenderBuilder`を作成する。
    ///
    /// # 引数
    ///
    /// - directory: ファイルを作成するディレクトリ。
    ///
    /// # 戻り値
    ///
    /// 既定値が設定された`TRFAppenderBuilder`インスタンス。
    pub fn builder(directory: impl AsRef<Path>) -> TRFAppenderBuilder {
        TRFAppenderBuilder::new(directory)
    }

    /// 指定された時刻に対応するファイルの`RollingWriter`を返却する。
    ///
    /// 時刻に対応するファイルがディスクに存在しない場合、バックアップ数を
    /// 超過した古いファイルを削除する。時刻に対応するファイル名が使用中の
    /// ファイル名と異なる場合、または使用中のファイルが存在しない場合、
    /// 新しいファイルに切り替える。
    fn writer_for(&self, at: OffsetDateTime) -> RollingWriter<'_> {
        let filepath = self.files.log_filepath(at);
        let exists = LoggingFile::file_exists(&filepath);
        if !exists {
            self.files.delete_excess_files();
        }
        {
            let active = self.read_active();
            if exists && active.path == filepath {
                return RollingWriter(active);
            }
        }
        {
            // 書き込みロックの下で再確認する。他のスレッドが先に切り替えていた
            // 場合は何もしない。
            let mut active = self.write_active();
            if active.path != filepath || !LoggingFile::file_exists(&filepath) {
                match create_writer(&filepath) {
                    Ok(file) => {
                        let _ = active.file.flush();
                        active.file = file;
                        active.path = filepath;
                    }
                    Err(err) => {
                        // 切り替えに失敗した場合、現在のファイルに記録し続ける
                        eprintln!(
                            "failed to open the log file {}: {}",
                            filepath.display(),
                            err
                        );
                    }
                }
            }
        }
        RollingWriter(self.read_active())
    }

    fn read_active(&self) -> RwLockReadGuard<'_, ActiveFile> {
        self.writer.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_active(&self) -> RwLockWriteGuard<'_, ActiveFile> {
        self.writer.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<'a> MakeWriter<'a> for TRFAppender {
    type Writer = OptionalWriter<RollingWriter<'a>>;

    fn make_writer(&'a self) -> Self::Writer {
        OptionalWriter::some(self.writer_for(now()))
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        // 最低ログレベルに満たないレコードは、ファイルに触れずに破棄する
        if *meta.level() > self.level {
            return OptionalWriter::none();
        }
        self.make_writer()
    }
}

impl io::Write for RollingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut handle = &self.0.file;
        handle.lock()?;
        let result = handle
            .write(buf)
            .and_then(|written| handle.flush().map(|()| written));
        let _ = handle.unlock();
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut handle = &self.0.file;
        handle.flush()
    }
}

/// `TRFAppender`の作成に失敗したときのエラー。
#[derive(Debug, Error)]
#[error("failed to open the initial log file {}: {source}", .path.display())]
pub struct BuildError {
    path: PathBuf,
    source: io::Error,
}

/// `TRFAppender`のビルダー。
///
/// ディレクトリ以外の設定には既定値があり、ファイル名の時刻フォーマットは
/// `DEFAULT_SUFFIX`、バックアップ数は`DEFAULT_BACKUP_COUNT`、最低ログレベルは
/// `DEFAULT_LEVEL`である。
pub struct TRFAppenderBuilder {
    directory: PathBuf,
    suffix: String,
    backup_count: u16,
    level: Level,
}

impl TRFAppenderBuilder {
    fn new(directory: impl AsRef<Path>) -> TRFAppenderBuilder {
        Self {
            directory: directory.as_ref().to_path_buf(),
            suffix: DEFAULT_SUFFIX.to_string(),
            backup_count: DEFAULT_BACKUP_COUNT,
            level: DEFAULT_LEVEL,
        }
    }

    /// ファイル名の時刻フォーマットを設定する。
    pub fn suffix(mut self, suffix: impl Into<String>) -> TRFAppenderBuilder {
        self.suffix = suffix.into();
        self
    }

    /// 残す最大ファイル数を設定する。
    pub fn backup_count(mut self, backup_count: u16) -> TRFAppenderBuilder {
        self.backup_count = backup_count;
        self
    }

    /// 記録する最低ログレベルを設定する。
    pub fn level(mut self, level: Level) -> TRFAppenderBuilder {
        self.level = level;
        self
    }

    /// `TRFAppender`を作成する。
    ///
    /// ディレクトリが存在しない場合は作成して、現在時刻に対応するログファイルを
    /// 開く。
    ///
    /// # 戻り値
    ///
    /// `TRFAppender`インスタンス。最初のログファイルを開けない場合は
    /// `BuildError`。
    pub fn build(self) -> Result<TRFAppender, BuildError> {
        let files = LoggingFile::new(&self.directory, &self.suffix, self.backup_count);
        files.ensure_directory();
        let path = files.log_filepath(now());
        let file = create_writer(&path).map_err(|source| BuildError {
            path: path.clone(),
            source,
        })?;
        Ok(TRFAppender {
            files,
            level: self.level,
            writer: RwLock::new(ActiveFile { path, file }),
        })
    }
}

/// ライターを作成する。
///
/// # 引数
///
/// * path: ログファイルパス。
///
/// # 戻り値
///
/// `File`インスタンス。
fn create_writer(path: &Path) -> io::Result<File> {
    let mut open_options = OpenOptions::new();
    open_options.append(true).create(true);

    let new_file = open_options.open(path);
    if new_file.is_err() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
            return open_options.open(path);
        }
    }

    new_file
}

/// 現在時刻を返却する。
///
/// ローカル時刻を取得できない場合、UTC時刻を返却する。
fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

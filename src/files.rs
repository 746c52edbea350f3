use std::{
    fs,
    path::{Path, PathBuf},
};

use time::{
    format_description::{self, OwnedFormatItem},
    Date, Month, OffsetDateTime, PrimitiveDateTime, Time,
};

/// 既定のファイル名の時刻フォーマット(`YYYY-MM-DD`)。
pub const DEFAULT_SUFFIX: &str = "[year]-[month]-[day]";

/// 削除数の余裕分。
/// 超過分に加えて、これから作成するファイルの分を1つ余分に削除する。
/// 削除後に新しいファイルを作成すると、ファイル数はバックアップ数に収まる。
pub const PRUNE_HEADROOM: usize = 1;

/// ログファイルを保存するディレクトリと、ログファイルの保持方針を管理する。
///
/// ファイル名は、設定された時刻フォーマットで時刻を書式化した文字列である。
/// 時刻として解析できない名前のファイルは、管理対象外として削除する。
pub struct LoggingFile {
    directory: PathBuf,
    suffix: OwnedFormatItem,
    backup_count: u16,
}

impl LoggingFile {
    /// `LoggingFile`を作成する。
    ///
    /// # Arguments
    ///
    /// * directory: ログファイルを保存するディレクトリ。
    /// * suffix: ファイル名の時刻フォーマット。解析できない場合、または自身が
    ///   書式化したファイル名を解析し直せない場合、既定のフォーマットを使用する。
    /// * backup_count: 残す最大ファイル数。
    ///
    /// # Returns
    ///
    /// `LoggingFile`インスタンス。
    pub fn new(directory: impl AsRef<Path>, suffix: &str, backup_count: u16) -> LoggingFile {
        Self {
            directory: directory.as_ref().to_path_buf(),
            suffix: parse_suffix(suffix),
            backup_count,
        }
    }

    /// ディレクトリが存在しない場合、ディレクトリを作成する。
    ///
    /// 作成に失敗しても、エラーを返却しない。
    pub fn ensure_directory(&self) {
        let _ = fs::create_dir_all(&self.directory);
    }

    /// ディレクトリ内のファイル名を列挙して返却する。
    ///
    /// # 戻り値
    ///
    /// ファイル名のベクタ。ディレクトリを読み込めない場合は空のベクタ。
    pub fn file_names(&self) -> Vec<String> {
        match fs::read_dir(&self.directory) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// ファイルが存在するか確認する。
    ///
    /// # 引数
    ///
    /// - path: 確認するファイルのパス。
    ///
    /// # 戻り値
    ///
    /// パスが通常のファイルとして存在する場合は`true`。
    pub fn file_exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// 指定された時刻に対応するログファイルパスを作成して返却する。
    ///
    /// # 引数
    ///
    /// - at: ファイル名に書式化する時刻。
    ///
    /// # 戻り値
    ///
    /// ログファイルパス。
    pub fn log_filepath(&self, at: OffsetDateTime) -> PathBuf {
        let name = at.format(&self.suffix).unwrap_or_else(|_| {
            at.format(&default_suffix()).expect(
                "unable to format the default filename suffix; this is a bug in \
                    timed-rotating-file-appender",
            )
        });
        self.directory.join(name)
    }

    /// ファイル名を時刻として解析して、古い順に並べ替えて返却する。
    ///
    /// 時刻として解析できない名前のファイルは削除する。
    /// 解析できた時刻は、時刻フォーマットで書式化し直して返却するため、
    /// 同じ時刻を表す異なる表記は1つの名前にまとまる。
    ///
    /// # 引数
    ///
    /// - names: 並べ替えるファイル名。
    ///
    /// # 戻り値
    ///
    /// 時刻フォーマットで書式化し直したファイル名を、古い順に格納したベクタ。
    pub fn sorted_timestamp_names(&self, names: Vec<String>) -> Vec<String> {
        let mut stamps: Vec<PrimitiveDateTime> = Vec::new();
        for name in names {
            match parse_timestamp(&name, &self.suffix) {
                Some(stamp) => stamps.push(stamp),
                None => self.delete_file(&name),
            }
        }
        stamps.sort();
        stamps
            .into_iter()
            .filter_map(|stamp| stamp.format(&self.suffix).ok())
            .collect()
    }

    /// バックアップ数を超過したログファイルを、古い順に削除する。
    ///
    /// ファイル数からバックアップ数を引いた差が0以上の場合、差に
    /// `PRUNE_HEADROOM`を加えた数のファイルを削除する。
    /// ディレクトリにファイルがない場合は何もしない。
    pub fn delete_excess_files(&self) {
        let names = self.file_names();
        if names.is_empty() {
            return;
        }
        let names = self.sorted_timestamp_names(names);
        let backup_count = usize::from(self.backup_count);
        if names.len() >= backup_count {
            let excess = names.len() - backup_count;
            for name in names.iter().take(excess + PRUNE_HEADROOM) {
                self.delete_file(name);
            }
        }
    }

    /// ディレクトリ内のファイルを削除する。
    ///
    /// 削除に失敗しても、エラーを返却しない。
    ///
    /// # 引数
    ///
    /// - name: 削除するファイルの名前。
    pub fn delete_file(&self, name: &str) {
        let _ = fs::remove_file(self.directory.join(name));
    }
}

/// 時刻フォーマットを解析して返却する。
///
/// フォーマットが解析できない場合、または自身が書式化したファイル名を
/// 解析し直せない場合、既定のフォーマットを返却する。
fn parse_suffix(suffix: &str) -> OwnedFormatItem {
    match format_description::parse_owned::<2>(suffix) {
        Ok(format) if round_trips(&format) => format,
        _ => default_suffix(),
    }
}

fn default_suffix() -> OwnedFormatItem {
    format_description::parse_owned::<2>(DEFAULT_SUFFIX).expect(
        "unable to parse the default filename suffix; this is a bug in \
            timed-rotating-file-appender",
    )
}

/// ファイル名を時刻として解析する。
///
/// 時刻成分を含まないフォーマットの場合、その日の0時として解析する。
fn parse_timestamp(name: &str, suffix: &OwnedFormatItem) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(name, suffix)
        .or_else(|_| Date::parse(name, suffix).map(Date::midnight))
        .ok()
}

/// フォーマットが自身の書式化したファイル名を解析し直せるか確認する。
fn round_trips(suffix: &OwnedFormatItem) -> bool {
    let reference = reference_timestamp();
    let Ok(rendered) = reference.format(suffix) else {
        return false;
    };
    match parse_timestamp(&rendered, suffix) {
        Some(stamp) => stamp
            .format(suffix)
            .map_or(false, |name| name == rendered),
        None => false,
    }
}

fn reference_timestamp() -> PrimitiveDateTime {
    let date = Date::from_calendar_date(2001, Month::February, 3).expect(
        "unable to build the reference date; this is a bug in timed-rotating-file-appender",
    );
    let time = Time::from_hms(4, 5, 6).expect(
        "unable to build the reference time; this is a bug in timed-rotating-file-appender",
    );
    PrimitiveDateTime::new(date, time)
}

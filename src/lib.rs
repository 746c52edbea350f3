//! Timed Rotating File Appender
//!
//! ----------------------------------------------------------------------------
//!
//! このクレートには、`TRFAppender(Timed Rotating File Appender)`構造体が
//! 含まれており、この構造体は、日付毎のファイルにログを記録することを目的としている。
//! `TRFAppender`は、`tracing-subscriber`クレートの`MakeWriter`を実装しており、
//! ログの書き込み先としてフォーマッタに渡すことができる。
//!
//! `TRFAppender`は、記録するとき、現在時刻に対応するファイル名を計算して、
//! ファイル名が変わった場合、ログの記録を新しいファイルに切り替える。
//! ファイル名の時刻フォーマットは設定でき、既定では日付(`YYYY-MM-DD`)である。
//!
//! また、`TRFAppender`は、残しておく最大ファイル数(バックアップ数)を持つ。
//! `TRFAppender`は、新しいファイルに切り替えるとき、ファイル数がバックアップ数を
//! 超過した場合、最も古いファイルから削除する。ファイル名を時刻として解析できない
//! ファイルは、管理対象外として削除する。
//!
//! ファイルへの書き込みは、排他的なアドバイザリロックを取得して行うため、
//! 複数のプロセスが同じファイルに追記しても、レコードが混ざらない。
//!
//! ファイルの切り替えは、記録するときに検出する(タイマーを使用しない)。
//! そのため、時刻の境界でログが記録されない場合、境界を越えた後の最初の
//! レコードから新しいファイルに記録される。

pub mod appenders;
pub mod files;

//! players 演示页
//!
//! 依次执行：插入 John Doe → 更新 id = 1 → 按 rating/pacing 查询并输出球员卡片，
//! 最后转储三组查询结果（全部、id = 1、rating = 99）。

use anyhow::{Context, Result};
use dyncrud::{fields, DbDriver, DynamicCrud, Record, Value};
use tracing::info;

const PLAYERS_TABLE: &str = "players";

/// 卡片上展示的列及标签
const CARD_COLUMNS: [(&str, &str); 5] = [
    ("name", "Player Name"),
    ("Physical", "Physical"),
    ("rating", "Rating"),
    ("pacing", "Pacing"),
    ("dribbling", "Dribbling"),
];

fn players_ddl(driver: DbDriver) -> &'static str {
    match driver {
        DbDriver::MySql => {
            "CREATE TABLE IF NOT EXISTS players (
                id INT AUTO_INCREMENT PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                Physical INT,
                rating INT,
                pacing INT,
                dribbling INT
            ) CHARACTER SET utf8mb4"
        }
        DbDriver::Postgres => {
            "CREATE TABLE IF NOT EXISTS players (
                id SERIAL PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                Physical INT,
                rating INT,
                pacing INT,
                dribbling INT
            )"
        }
        DbDriver::Sqlite => {
            "CREATE TABLE IF NOT EXISTS players (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                Physical INTEGER,
                rating INTEGER,
                pacing INTEGER,
                dribbling INTEGER
            )"
        }
    }
}

/// 创建 players 表（已存在则跳过）
pub async fn create_players_table(crud: &DynamicCrud) -> Result<()> {
    let db = crud.database();
    db.execute(players_ddl(db.driver()))
        .await
        .context("Failed to create players table")?;
    info!("players table ready");
    Ok(())
}

/// 单元格文本；缺失列和 NULL 都显示为空
fn cell(player: &Record, column: &str) -> String {
    match player.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(value) => value.to_string(),
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 输出目标：纯文本或 HTML
struct Page {
    html: bool,
    body: String,
}

impl Page {
    fn new(html: bool) -> Self {
        Self {
            html,
            body: String::new(),
        }
    }

    fn line(&mut self, text: &str) {
        if self.html {
            self.body.push_str(&format!("{}<br>\n", escape_html(text)));
        } else {
            self.body.push_str(text);
            self.body.push('\n');
        }
    }

    fn rule(&mut self) {
        if self.html {
            self.body.push_str("<hr>\n");
        } else {
            self.body.push_str("----------------------------------------\n");
        }
    }

    fn card(&mut self, player: &Record) {
        for (column, label) in CARD_COLUMNS {
            self.line(&format!("{}: {}", label, cell(player, column)));
        }
        self.rule();
    }

    fn dump(&mut self, title: &str, rows: &[Record]) -> Result<()> {
        let json = serde_json::to_string_pretty(rows)?;
        if self.html {
            self.body.push_str(&format!(
                "<h2>{}</h2>\n<pre>{}</pre>\n",
                escape_html(title),
                escape_html(&json)
            ));
        } else {
            self.body.push_str(&format!("== {} ==\n{}\n", title, json));
        }
        Ok(())
    }

    fn finish(self) -> String {
        if !self.html {
            return self.body;
        }
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"UTF-8\">\n    \
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n    \
             <title>Players</title>\n</head>\n<body>\n{}</body>\n</html>\n",
            self.body
        )
    }
}

/// 执行演示流程并返回渲染后的页面
pub async fn run(crud: &DynamicCrud, html: bool) -> Result<String> {
    crud.create(
        PLAYERS_TABLE,
        &fields! {
            "name" => "John Doe",
            "Physical" => 80,
            "rating" => 99,
            "pacing" => 90,
            "dribbling" => 85,
        },
    )
    .await
    .context("Failed to create player")?;

    let affected = crud
        .update(
            PLAYERS_TABLE,
            &fields! { "Physical" => 50, "rating" => 50, "pacing" => 50 },
            &fields! { "id" => 1 },
        )
        .await
        .context("Failed to update player 1")?;
    info!(affected, "updated player 1");

    let mut page = Page::new(html);

    let players = crud
        .read(PLAYERS_TABLE, &fields! { "rating" => 50, "pacing" => 50 })
        .await
        .context("Failed to read players")?;
    for player in &players {
        page.card(player);
    }

    let all_players = crud.read_all(PLAYERS_TABLE).await?;
    page.dump("All players", &all_players)?;

    let player = crud.read(PLAYERS_TABLE, &fields! { "id" => 1 }).await?;
    page.dump("Player 1", &player)?;

    let high_rated = crud.read(PLAYERS_TABLE, &fields! { "rating" => 99 }).await?;
    page.dump("Rating 99", &high_rated)?;

    Ok(page.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dyncrud::DbConfig;

    async fn sqlite_crud() -> DynamicCrud {
        let crud = DynamicCrud::connect(&DbConfig::sqlite_memory()).await.unwrap();
        create_players_table(&crud).await.unwrap();
        crud
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>O'Brien & \"Co\"</b>"),
            "&lt;b&gt;O&#39;Brien &amp; &quot;Co&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_missing_column_renders_empty() {
        let player = fields! { "name" => "John Doe", "rating" => Value::Null };
        assert_eq!(cell(&player, "name"), "John Doe");
        assert_eq!(cell(&player, "rating"), "");
        assert_eq!(cell(&player, "dribbling"), "");
    }

    #[tokio::test]
    async fn test_demo_text_page() {
        let crud = sqlite_crud().await;
        let page = run(&crud, false).await.unwrap();

        assert!(page.contains("Player Name: John Doe"));
        assert!(page.contains("Physical: 50"));
        assert!(page.contains("Rating: 50"));
        assert!(page.contains("Dribbling: 85"));
        assert!(page.contains("== Rating 99 ==\n[]"));

        let rows = crud.read_all(PLAYERS_TABLE).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["pacing"], Value::Int(50));
    }

    #[tokio::test]
    async fn test_demo_second_run_keeps_first_player() {
        let crud = sqlite_crud().await;
        run(&crud, false).await.unwrap();
        let page = run(&crud, false).await.unwrap();

        // 第二次插入的球员 rating 仍为 99，只有 id = 1 被更新
        assert_eq!(page.matches("Player Name: John Doe").count(), 1);
        let high_rated = crud
            .read(PLAYERS_TABLE, &fields! { "rating" => 99 })
            .await
            .unwrap();
        assert_eq!(high_rated.len(), 1);
        assert_eq!(high_rated[0]["id"], Value::Int(2));
    }

    #[tokio::test]
    async fn test_demo_html_page() {
        let crud = sqlite_crud().await;
        let page = run(&crud, true).await.unwrap();

        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("Player Name: John Doe<br>"));
        assert!(page.contains("<hr>"));
        assert!(page.contains("<h2>All players</h2>"));
        assert!(page.trim_end().ends_with("</html>"));
    }
}

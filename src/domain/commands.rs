use serde::{Deserialize, Serialize};

use super::{BookValidationError, Stock};

/// コマンド：書籍を登録する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBook {
    pub title: String,
    pub author: String,
    pub initial_stock: Stock,
}

impl CreateBook {
    /// タイトル・著者・初期在庫を検証し、前後の空白を取り除いたコマンドを返す
    pub fn validate(self) -> Result<Self, BookValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(BookValidationError::BlankTitle);
        }
        let author = self.author.trim();
        if author.is_empty() {
            return Err(BookValidationError::BlankAuthor);
        }
        if self.initial_stock.value() > Stock::MAX {
            return Err(BookValidationError::StockTooLarge {
                value: self.initial_stock.value(),
                max: Stock::MAX,
            });
        }

        Ok(Self {
            title: title.to_string(),
            author: author.to_string(),
            initial_stock: self.initial_stock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(title: &str, author: &str) -> CreateBook {
        CreateBook {
            title: title.to_string(),
            author: author.to_string(),
            initial_stock: Stock::new(2),
        }
    }

    #[test]
    fn test_validate_trims_fields() {
        let cmd = command("  Dune ", " Frank Herbert").validate().unwrap();
        assert_eq!(cmd.title, "Dune");
        assert_eq!(cmd.author, "Frank Herbert");
        assert_eq!(cmd.initial_stock.value(), 2);
    }

    #[test]
    fn test_validate_rejects_blank_title() {
        assert_eq!(
            command("   ", "Someone").validate(),
            Err(BookValidationError::BlankTitle)
        );
    }

    #[test]
    fn test_validate_rejects_stock_beyond_ledger_range() {
        let mut cmd = command("Dune", "Frank Herbert");
        cmd.initial_stock = Stock::new(3_000_000_000);
        assert_eq!(
            cmd.validate(),
            Err(BookValidationError::StockTooLarge {
                value: 3_000_000_000,
                max: Stock::MAX
            })
        );

        let mut cmd = command("Dune", "Frank Herbert");
        cmd.initial_stock = Stock::new(Stock::MAX);
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_author() {
        assert_eq!(
            command("Dune", "").validate(),
            Err(BookValidationError::BlankAuthor)
        );
    }
}

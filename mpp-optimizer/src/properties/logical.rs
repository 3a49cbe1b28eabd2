use datafusion_common::Column;

/// Properties shared by every expression in a group.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct LogicalProperty {
    output_columns: Vec<Column>,
}

impl LogicalProperty {
    pub fn new(output_columns: Vec<Column>) -> Self {
        Self { output_columns }
    }

    pub fn output_columns(&self) -> &[Column] {
        &self.output_columns
    }
}

use iso_currency::Currency;

use crate::{entities::SettlementView, presentation::utils::format_amount};

const LABEL_WIDTH: usize = 14;

pub(crate) struct SettlementPrinter {
    currency: Currency,
}

impl SettlementPrinter {
    pub(crate) fn new(currency: Currency) -> Self {
        Self { currency }
    }

    pub(crate) fn print(&self, view: &SettlementView) -> String {
        let mut output = String::new();

        output.push_str(&format!("合併結算報表 {}\n\n", view.date.format("%Y-%m-%d")));

        output.push_str(
            "; --- Locations ----------------------------------------------------------------\n\n",
        );
        self.print_locations(&mut output, view);
        output.push('\n');

        output.push_str(
            "; --- Totals -------------------------------------------------------------------\n\n",
        );
        self.print_totals(&mut output, view);
        output.push('\n');

        output.push_str(
            "; --- Remarks ------------------------------------------------------------------\n\n",
        );
        self.print_remarks(&mut output, view);

        output
    }

    fn print_locations(&self, output: &mut String, view: &SettlementView) {
        for report in &view.reports {
            let day = &report.day;
            output.push_str(&format!("{}\n", report.location_name));
            self.line(output, "開店現金", day.opening_cash);
            self.line(output, "手帳營收", day.total_sales);
            self.line(output, "其他現金", day.other_income_total());
            self.line(
                output,
                "應有現金",
                day.expected_cash.unwrap_or_else(|| day.expected_total()),
            );
            self.line(output, "實有現金", day.closing_cash.unwrap_or(0.0));
            self.line(output, "溢短收", day.difference());
            output.push_str(&format!(
                "    {:<LABEL_WIDTH$} {}\n",
                "結單數/品項數",
                format!("{}/{}", day.total_transactions, day.total_items)
            ));
            output.push('\n');
        }
    }

    fn print_totals(&self, output: &mut String, view: &SettlementView) {
        let t = &view.totals;
        self.line(output, "A 應有現金", t.expected_cash);
        self.line(output, "B 手帳營收", t.total_sales);
        self.line(output, "C 開店現金", t.opening_cash);
        self.line(output, "D 實有現金", t.closing_cash);
        self.line(output, "E 溢短收", t.cash_diff);
        self.line(output, "F 其他現金", t.other_cash);
        self.line(output, "G 當日總現金", t.total_cash);
        self.line(output, "H 存款", t.deposit);
        self.line(output, "I 明日開店現金", t.next_day_cash);
        output.push_str(&format!("    {:<LABEL_WIDTH$} {}\n", "J 結單數", t.total_transactions));
        output.push_str(&format!("    {:<LABEL_WIDTH$} {}\n", "K 品項數", t.total_items));
    }

    fn print_remarks(&self, output: &mut String, view: &SettlementView) {
        let remarks = view.settlement.as_ref().map(|s| &s.remarks);
        match remarks {
            Some(remarks) if !remarks.is_empty() => {
                for (key, value) in remarks {
                    output.push_str(&format!("{}\n", key));
                    for line in textwrap::wrap(value, 74) {
                        output.push_str(&format!("    {}\n", line));
                    }
                }
            }
            _ => output.push_str("(none)\n"),
        }
    }

    fn line(&self, output: &mut String, label: &str, amount: f64) {
        output.push_str(&format!(
            "    {:<LABEL_WIDTH$} {:>20}\n",
            label,
            format_amount(amount, self.currency)
        ));
    }
}

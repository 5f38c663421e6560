pub mod report_month;

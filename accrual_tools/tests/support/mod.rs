pub mod mock_accrual;
